//! Terminal rendering of agent progress

use dbbot_agent::StepEvent;

/// Longest observation echoed to the terminal
const OBSERVATION_PREVIEW: usize = 400;

/// Single line, cut on a char boundary
fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.len() <= max {
        return flat;
    }
    let mut end = max;
    while !flat.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &flat[..end])
}

/// One line per intermediate step; the final answer is printed by the caller
pub fn step_line(event: &StepEvent) -> Option<String> {
    match event {
        StepEvent::Action {
            step,
            thought,
            tool,
            input,
        } => {
            let mut line = String::new();
            if !thought.is_empty() {
                line.push_str(&format!("  [{}] {}\n", step, preview(thought, 200)));
            }
            line.push_str(&format!("  [{}] → {}: {}", step, tool, preview(input, 200)));
            Some(line)
        }
        StepEvent::Observation { step, text, .. } => Some(format!(
            "  [{}] ← {}",
            step,
            preview(text, OBSERVATION_PREVIEW)
        )),
        StepEvent::ParseError { step, observation } => {
            Some(format!("  [{}] ! {}", step, observation))
        }
        StepEvent::StepLimit { steps } => Some(format!("  ! stopped after {} steps", steps)),
        StepEvent::Finish { .. } => None,
    }
}

/// Observer that prints steps as they happen
pub fn print_step(event: &StepEvent) {
    if let Some(line) = step_line(event) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_flattens_and_cuts() {
        assert_eq!(preview("a\n  b\tc", 10), "a b c");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("ééé", 3), "é...");
    }

    #[test]
    fn test_action_line() {
        let line = step_line(&StepEvent::Action {
            step: 2,
            thought: "I should look at the schema.".to_string(),
            tool: "sql_db_schema".to_string(),
            input: "customer, invoice".to_string(),
        })
        .unwrap();
        assert_eq!(
            line,
            "  [2] I should look at the schema.\n  [2] → sql_db_schema: customer, invoice"
        );
    }

    #[test]
    fn test_observation_line() {
        let line = step_line(&StepEvent::Observation {
            step: 1,
            tool: "sql_db_query".to_string(),
            text: "Country\tSales\nUSA\t40.5".to_string(),
        })
        .unwrap();
        assert_eq!(line, "  [1] ← Country Sales USA 40.5");
    }

    #[test]
    fn test_finish_is_silent() {
        assert!(step_line(&StepEvent::Finish {
            step: 3,
            answer: "done".to_string(),
        })
        .is_none());
    }

    #[test]
    fn test_step_limit_line() {
        assert_eq!(
            step_line(&StepEvent::StepLimit { steps: 15 }).unwrap(),
            "  ! stopped after 15 steps"
        );
    }
}
