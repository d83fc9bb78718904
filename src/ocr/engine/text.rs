use crate::ocr::model::OcrElement;

const LINE_ENDINGS: [char; 2] = ['\r', '\n'];

/// Literal text of `element` inside `full_text`, or `""` when the anchor is
/// missing or does not satisfy `0 <= start < end <= len`.
///
/// Offsets count Unicode scalar values.
pub fn extract_span<'a>(element: &OcrElement, full_text: &'a str) -> &'a str {
    let Some((start, end)) = element.text_range() else {
        return "";
    };
    if start < 0 || start >= end {
        return "";
    }
    let (start, end) = (start as usize, end as usize);

    let mut bounds = full_text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(full_text.len()));
    let Some(start_byte) = bounds.nth(start) else {
        return "";
    };
    let Some(end_byte) = bounds.nth(end - start - 1) else {
        return "";
    };
    &full_text[start_byte..end_byte]
}

/// Text as it is drawn: line endings removed, surrounding whitespace trimmed.
pub fn drawable_text(span: &str) -> String {
    span.chars()
        .filter(|ch| !LINE_ENDINGS.contains(ch))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn anchored(start: serde_json::Value, end: serde_json::Value) -> OcrElement {
        serde_json::from_value(json!({
            "layout": { "textAnchor": { "textSegments": [{ "startIndex": start, "endIndex": end }] } }
        }))
        .unwrap()
    }

    #[test]
    fn returns_exact_substring() {
        let text = "HELLO WORLD";
        assert_eq!(extract_span(&anchored(json!("0"), json!("5")), text), "HELLO");
        assert_eq!(extract_span(&anchored(json!("6"), json!("11")), text), "WORLD");
    }

    #[test]
    fn rejects_inverted_empty_and_overlong_ranges() {
        let text = "HELLO WORLD";
        assert_eq!(extract_span(&anchored(json!("20"), json!("5")), text), "");
        assert_eq!(extract_span(&anchored(json!("4"), json!("4")), text), "");
        assert_eq!(extract_span(&anchored(json!("6"), json!("12")), text), "");
        assert_eq!(extract_span(&anchored(json!("-1"), json!("3")), text), "");
    }

    #[test]
    fn missing_anchor_fields_read_as_no_text() {
        let text = "HELLO";
        assert_eq!(extract_span(&OcrElement::default(), text), "");
        let no_segments: OcrElement =
            serde_json::from_value(json!({ "layout": { "textAnchor": {} } })).unwrap();
        assert_eq!(extract_span(&no_segments, text), "");
        let no_start: OcrElement = serde_json::from_value(json!({
            "layout": { "textAnchor": { "textSegments": [{ "endIndex": "3" }] } }
        }))
        .unwrap();
        assert_eq!(extract_span(&no_start, text), "HEL");
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let text = "Größe über";
        assert_eq!(extract_span(&anchored(json!("6"), json!("10")), text), "über");
        assert_eq!(extract_span(&anchored(json!("0"), json!("10")), text), text);
    }

    #[test]
    fn drawable_text_strips_line_endings() {
        assert_eq!(drawable_text("HELLO\r\n"), "HELLO");
        assert_eq!(drawable_text(" a\nb "), "ab");
        assert_eq!(drawable_text("\n"), "");
    }
}
