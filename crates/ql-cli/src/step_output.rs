use ql_api::SessionStep;
use ql_core::{ContentKind, EventParameters};

fn json_string(value: &str) -> String {
    serde_json::to_string(value).expect("string json")
}

pub(crate) fn render_step_lines(
    step: &SessionStep,
    parameters: Option<&EventParameters>,
    state_out: &str,
) -> Vec<String> {
    let mut lines = vec!["RESULT:OK".to_string()];

    if let Some(parameters) = parameters {
        lines.push(format!(
            "PARAMS_JSON:{}",
            serde_json::to_string(parameters).expect("event parameters json")
        ));
    }

    match step {
        SessionStep::Roleplay(roleplay) => {
            lines.push("STEP:ROLEPLAY".to_string());
            if let Some(title) = &roleplay.title {
                lines.push(format!("TITLE_JSON:{}", json_string(title)));
            }
            if let Some(icon) = &roleplay.icon {
                lines.push(format!("ICON_JSON:{}", json_string(icon)));
            }
            for item in &roleplay.content {
                let kind = match item.kind {
                    ContentKind::Text => "text",
                    ContentKind::Instruction => "instruction",
                };
                lines.push(format!("CONTENT:{}|{}", kind, json_string(&item.text)));
            }
            for choice in &roleplay.choices {
                lines.push(format!("CHOICE:{}|{}", choice.idx, json_string(&choice.text)));
            }
        }
        SessionStep::Combat(combat) => {
            lines.push("STEP:COMBAT".to_string());
            if let Some(icon) = &combat.icon {
                lines.push(format!("ICON_JSON:{}", json_string(icon)));
            }
            for enemy in &combat.enemies {
                let mut line = format!("ENEMY:{}|{}", enemy.tier, json_string(&enemy.name));
                if let Some(class) = &enemy.class {
                    line.push('|');
                    line.push_str(&json_string(class));
                }
                lines.push(line);
            }
        }
        SessionStep::End => lines.push("STEP:END".to_string()),
    }

    lines.push(format!("STATE_OUT:{}", state_out));
    lines
}

pub(crate) fn emit_step(step: &SessionStep, parameters: Option<&EventParameters>, state_out: &str) {
    for line in render_step_lines(step, parameters, state_out) {
        println!("{}", line);
    }
}
