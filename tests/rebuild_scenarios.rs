use ocr_layer_rust::ocr::{
    DrawOp, FontBook, OcrDocument, RebuildContext, RebuildSettings, RecordingCanvas, rebuild_page,
};
use serde_json::{Value, json};

fn hello_page(start: &str, end: &str, orientation: &str) -> Value {
    json!({
        "text": "HELLO WORLD",
        "pages": [{
            "tokens": [{
                "layout": {
                    "textAnchor": { "textSegments": [{ "startIndex": start, "endIndex": end }] },
                    "boundingPoly": { "normalizedVertices": [
                        { "x": 0.1, "y": 0.1 },
                        { "x": 0.5, "y": 0.1 },
                        { "x": 0.5, "y": 0.2 },
                        { "x": 0.1, "y": 0.2 }
                    ] },
                    "orientation": orientation
                }
            }]
        }]
    })
}

fn rebuild_letter_page(value: Value, settings: &RebuildSettings) -> (bool, RecordingCanvas) {
    let document = OcrDocument::from_value(value).unwrap();
    let fonts = FontBook::builtin();
    let ctx = RebuildContext {
        settings,
        fonts: &fonts,
    };
    let mut canvas = RecordingCanvas::new(612.0, 792.0);
    let rebuilt = rebuild_page(&document, &mut canvas, &ctx);
    (rebuilt, canvas)
}

fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-3,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn upright_token_is_drawn_in_its_box() {
    let settings = RebuildSettings::default();
    let (rebuilt, canvas) = rebuild_letter_page(hello_page("0", "5", "PAGE_UP"), &settings);
    assert!(rebuilt);

    let texts: Vec<_> = canvas.texts().collect();
    assert_eq!(texts.len(), 1);
    let element = texts[0];
    assert_eq!(element.text, "HELLO");
    assert_close(element.rect.x, 61.2);
    assert_close(element.rect.y, 79.2);
    assert_close(element.rect.width, 244.8);
    assert_close(element.rect.height, 79.2);
    assert!(element.size > 0.0);
    assert!(matches!(canvas.ops()[0], DrawOp::Text { visible: false, .. }));
}

#[test]
fn visible_text_and_outline_follow_settings() {
    let settings = RebuildSettings {
        text_visible: true,
        box_visible: true,
        ..RebuildSettings::default()
    };
    let (rebuilt, canvas) = rebuild_letter_page(hello_page("0", "5", "PAGE_UP"), &settings);
    assert!(rebuilt);
    assert_eq!(canvas.ops().len(), 2);
    assert!(matches!(canvas.ops()[0], DrawOp::Text { visible: true, .. }));
    match &canvas.ops()[1] {
        DrawOp::Rectangle(rect) => assert_close(rect.width, 244.8),
        other => panic!("expected outline, got {:?}", other),
    }
}

#[test]
fn upside_down_token_is_dropped_but_page_succeeds() {
    let (rebuilt, canvas) =
        rebuild_letter_page(hello_page("0", "5", "PAGE_DOWN"), &RebuildSettings::default());
    assert!(rebuilt);
    assert!(canvas.ops().is_empty());
}

#[test]
fn reversed_anchor_is_skipped() {
    let (rebuilt, canvas) =
        rebuild_letter_page(hello_page("20", "5", "PAGE_UP"), &RebuildSettings::default());
    assert!(rebuilt);
    assert!(canvas.ops().is_empty());
}

#[test]
fn cached_document_fixture_rebuilds_upright_tokens() {
    let payload = include_str!("fixtures/documentai_response.json");
    let response: Value = serde_json::from_str(payload).unwrap();
    let document = response["document"].clone();
    let (rebuilt, canvas) = rebuild_letter_page(document, &RebuildSettings::default());
    assert!(rebuilt);
    let texts: Vec<_> = canvas.texts().map(|element| element.text.as_str()).collect();
    insta::assert_json_snapshot!(texts, @r###"
    [
      "Invoice",
      "2024",
      "Total"
    ]
    "###);
}
