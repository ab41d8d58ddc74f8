//! Text rendering for pipeline output shown in the results panes

use crate::schemas::{Entity, MaskPrediction};

const RULE_WIDTH: usize = 50;

pub const NO_ENTITIES_MESSAGE: &str = "No named entities found in the text.";

fn heading(title: &str) -> String {
    format!("{title}:\n{}\n\n", "=".repeat(RULE_WIDTH))
}

/// Numbered entity list, or a fixed message when nothing was found.
pub fn render_entities(entities: &[Entity]) -> String {
    if entities.is_empty() {
        return NO_ENTITIES_MESSAGE.to_string();
    }
    let mut out = heading("Extracted Entities");
    for (i, entity) in entities.iter().enumerate() {
        out.push_str(&format!(
            "{}. {}: {}\n   Confidence: {:.3}\n\n",
            i + 1,
            entity.group,
            entity.text,
            entity.score
        ));
    }
    out
}

/// Numbered prediction list in the order the pipeline returned it.
pub fn render_mask_predictions(predictions: &[MaskPrediction]) -> String {
    let mut out = heading("Mask Predictions");
    for (i, pred) in predictions.iter().enumerate() {
        out.push_str(&format!(
            "{}. {}\n   Confidence: {:.3}\n   Token: {}\n\n",
            i + 1,
            pred.filled_sequence,
            pred.score,
            pred.token
        ));
    }
    out
}

/// Acknowledgement shown in place of a generated image.
pub fn render_image_acknowledgement(prompt: &str) -> String {
    format!("Generating image for: '{prompt}'\n\n(Image generation requires additional setup)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_rule() {
        let h = heading("Mask Predictions");
        assert_eq!(h, format!("Mask Predictions:\n{}\n\n", "=".repeat(50)));
    }

    #[test]
    fn test_empty_prediction_list_keeps_heading() {
        assert!(render_mask_predictions(&[]).starts_with("Mask Predictions:"));
    }
}
