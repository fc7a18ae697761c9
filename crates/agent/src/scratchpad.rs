//! Per-question record of steps taken so far

/// One thought/action/observation cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Raw completion that led to the action
    pub log: String,
    pub action: String,
    pub action_input: String,
    pub observation: String,
}

/// Steps of the current question; dropped when the question is answered
#[derive(Debug, Clone, Default)]
pub struct Scratchpad {
    steps: Vec<Step>,
}

impl Scratchpad {
    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps in the form the model continues from, ending in a fresh `Thought:`
    pub fn render(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            out.push_str(&step.log);
            out.push_str("\nObservation: ");
            out.push_str(&step.observation);
            out.push_str("\nThought: ");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_render() {
        assert_eq!(Scratchpad::default().render(), "");
    }

    #[test]
    fn test_render_steps() {
        let mut pad = Scratchpad::default();
        pad.push(Step {
            log: " list tables\nAction: sql_db_list_tables\nAction Input: ".to_string(),
            action: "sql_db_list_tables".to_string(),
            action_input: String::new(),
            observation: "customer, invoice".to_string(),
        });
        assert_eq!(
            pad.render(),
            " list tables\nAction: sql_db_list_tables\nAction Input: \nObservation: customer, invoice\nThought: "
        );
        assert_eq!(pad.len(), 1);
    }
}
