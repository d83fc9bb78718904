use crate::ocr::model::OcrElement;

/// Sorts top-to-bottom, then left-to-right, by each element's first vertex.
///
/// The sort is stable, so elements sharing a top-left corner keep their
/// input order.
pub fn sort_reading_order(elements: &mut [OcrElement]) {
    elements.sort_by(|a, b| {
        let (ax, ay) = a.top_left();
        let (bx, by) = b.top_left();
        ay.total_cmp(&by).then(ax.total_cmp(&bx))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(x: f32, y: f32, label: &str) -> OcrElement {
        serde_json::from_value(json!({
            "layout": {
                "boundingPoly": { "normalizedVertices": [{ "x": x, "y": y }] },
                "orientation": label
            }
        }))
        .unwrap()
    }

    fn labels(elements: &[OcrElement]) -> Vec<String> {
        elements
            .iter()
            .map(|element| element.orientation().unwrap_or("").to_string())
            .collect()
    }

    #[test]
    fn orders_rows_then_columns() {
        let mut elements = vec![
            at(0.6, 0.2, "c"),
            at(0.1, 0.5, "d"),
            at(0.1, 0.2, "b"),
            at(0.9, 0.1, "a"),
        ];
        sort_reading_order(&mut elements);
        insta::assert_json_snapshot!(labels(&elements), @r###"
        [
          "a",
          "b",
          "c",
          "d"
        ]
        "###);
    }

    #[test]
    fn equal_corners_keep_input_order_and_runs_agree() {
        let input = vec![
            at(0.3, 0.3, "first"),
            at(0.3, 0.3, "second"),
            at(0.2, 0.3, "left"),
        ];
        let mut once = input.clone();
        let mut twice = input;
        sort_reading_order(&mut once);
        sort_reading_order(&mut twice);
        assert_eq!(labels(&once), vec!["left", "first", "second"]);
        assert_eq!(labels(&once), labels(&twice));
    }

    #[test]
    fn elements_without_polygon_sort_as_origin() {
        let mut elements = vec![at(0.1, 0.1, "placed"), OcrElement::default()];
        sort_reading_order(&mut elements);
        assert_eq!(labels(&elements), vec!["", "placed"]);
    }
}
