//! Core Animation documents for video descriptors
//!
//! The element and attribute vocabulary here is read by the poster app's
//! renderer and must not drift.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use std::io::{self, Write};

const CAML_NAMESPACE: &str = "http://www.apple.com/CoreAnimation/1.0";
const STATES: [&str; 3] = ["Locked", "Unlock", "Sleep"];
const TRANSITIONS: [(&str, &str); 6] = [
    ("*", "Unlock"),
    ("Unlock", "*"),
    ("*", "Locked"),
    ("Locked", "*"),
    ("*", "Sleep"),
    ("Sleep", "*"),
];

/// A flip-book animation over a list of frame images
#[derive(Debug, Clone, PartialEq)]
pub struct CamlDocument {
    pub width: u32,
    pub height: u32,
    /// Seconds for one pass through the frames
    pub duration: f64,
    pub auto_reverses: bool,
    /// Frame image paths relative to the `.ca` bundle
    pub frames: Vec<String>,
}

/// Length of the animation: whole frames only
pub fn animation_duration(fps: f64, duration_secs: f64) -> f64 {
    if fps <= 0.0 {
        return 0.0;
    }
    (fps * duration_secs).floor() / fps
}

/// Format a real the way the renderer's own tooling does: integral values
/// keep one decimal place
pub fn format_real(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

impl CamlDocument {
    pub fn write<W: Write>(&self, out: W) -> io::Result<()> {
        let mut writer = Writer::new_with_indent(out, b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut caml = BytesStart::new("caml");
        caml.push_attribute(("xmlns", CAML_NAMESPACE));
        writer.write_event(Event::Start(caml))?;

        let bounds = format!("0 0 {} {}", self.width, self.height);
        let position = format!("{} {}", self.width / 2, self.height / 2);

        let mut floating = BytesStart::new("CALayer");
        floating.extend_attributes([
            ("allowsEdgeAntialiasing", "1"),
            ("allowsGroupOpacity", "1"),
            ("bounds", bounds.as_str()),
            ("contentsFormat", "RGBA8"),
            ("cornerCurve", "circular"),
            ("hidden", "0"),
            ("name", "_FLOATING"),
            ("position", position.as_str()),
        ]);
        writer.write_event(Event::Start(floating))?;
        writer.write_event(Event::Start(BytesStart::new("sublayers")))?;

        let mut chip = BytesStart::new("CATransformLayer");
        chip.extend_attributes([
            ("allowsEdgeAntialiasing", "1"),
            ("allowsGroupOpacity", "1"),
            ("allowsHitTesting", "1"),
            ("bounds", bounds.as_str()),
            ("contentsFormat", "RGBA8"),
            ("cornerCurve", "circular"),
            ("name", "Chip"),
            ("position", position.as_str()),
        ]);
        writer.write_event(Event::Start(chip))?;
        writer.write_event(Event::Start(BytesStart::new("sublayers")))?;

        let mut layer = BytesStart::new("CALayer");
        layer.extend_attributes([
            ("allowsEdgeAntialiasing", "1"),
            ("allowsGroupOpacity", "1"),
            ("bounds", bounds.as_str()),
            ("contentsFormat", "RGBA8"),
            ("cornerCurve", "circular"),
            ("name", "CALayer1"),
            ("position", position.as_str()),
        ]);
        writer.write_event(Event::Start(layer))?;

        let first = self
            .frames
            .first()
            .map(String::as_str)
            .unwrap_or("assets/0.jpg");
        let mut contents = BytesStart::new("contents");
        contents.extend_attributes([("type", "CGImage"), ("src", first)]);
        writer.write_event(Event::Empty(contents))?;

        self.write_animation(&mut writer)?;

        writer.write_event(Event::End(BytesEnd::new("CALayer")))?;
        writer.write_event(Event::End(BytesEnd::new("sublayers")))?;
        writer.write_event(Event::End(BytesEnd::new("CATransformLayer")))?;
        writer.write_event(Event::End(BytesEnd::new("sublayers")))?;

        write_states(&mut writer)?;

        writer.write_event(Event::End(BytesEnd::new("CALayer")))?;
        writer.write_event(Event::End(BytesEnd::new("caml")))?;
        Ok(())
    }

    fn write_animation<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.write_event(Event::Start(BytesStart::new("animations")))?;

        let duration = format_real(self.duration);
        let mut animation = BytesStart::new("animation");
        animation.extend_attributes([
            ("type", "CAKeyframeAnimation"),
            ("calculationMode", "linear"),
            ("keyPath", "contents"),
            ("beginTime", "1e-100"),
            ("duration", duration.as_str()),
            ("removedOnCompletion", "0"),
            ("repeatCount", "inf"),
            ("repeatDuration", "0"),
            ("speed", "1"),
            ("timeOffset", "0"),
            ("autoreverses", if self.auto_reverses { "1" } else { "0" }),
        ]);
        writer.write_event(Event::Start(animation))?;

        writer.write_event(Event::Start(BytesStart::new("values")))?;
        for frame in &self.frames {
            let mut image = BytesStart::new("CGImage");
            image.push_attribute(("src", frame.as_str()));
            writer.write_event(Event::Empty(image))?;
        }
        writer.write_event(Event::End(BytesEnd::new("values")))?;

        writer.write_event(Event::End(BytesEnd::new("animation")))?;
        writer.write_event(Event::End(BytesEnd::new("animations")))?;
        Ok(())
    }
}

fn write_states<W: Write>(writer: &mut Writer<W>) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new("states")))?;
    for name in STATES {
        let mut state = BytesStart::new("LKState");
        state.push_attribute(("name", name));
        writer.write_event(Event::Start(state))?;
        writer.write_event(Event::Empty(BytesStart::new("elements")))?;
        writer.write_event(Event::End(BytesEnd::new("LKState")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("states")))?;

    writer.write_event(Event::Start(BytesStart::new("stateTransitions")))?;
    for (from, to) in TRANSITIONS {
        let mut transition = BytesStart::new("LKStateTransition");
        transition.extend_attributes([("fromState", from), ("toState", to)]);
        writer.write_event(Event::Start(transition))?;
        writer.write_event(Event::Empty(BytesStart::new("elements")))?;
        writer.write_event(Event::End(BytesEnd::new("LKStateTransition")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("stateTransitions")))?;
    Ok(())
}

/// Player settings document that sits next to `main.caml`
pub fn index_document(width: u32, height: u32, root_document: &str) -> plist::Value {
    use plist::Value;

    let entries: Vec<(&str, Value)> = vec![
        ("assetManifest", Value::String("assetManifest.caml".to_string())),
        ("documentHeight", Value::Real(f64::from(height))),
        ("documentResizesToView", Value::Boolean(true)),
        ("documentWidth", Value::Real(f64::from(width))),
        ("dynamicGuidesEnabled", Value::Boolean(true)),
        ("geometryFlipped", Value::Boolean(false)),
        ("guidesEnabled", Value::Boolean(true)),
        ("interactiveMouseEventsEnabled", Value::Boolean(true)),
        ("interactiveShowsCursor", Value::Boolean(true)),
        ("interactiveTouchEventsEnabled", Value::Boolean(false)),
        ("loopEnd", Value::Real(0.0)),
        ("loopStart", Value::Real(0.0)),
        ("loopingEnabled", Value::Boolean(false)),
        ("multitouchDisablesMouse", Value::Boolean(false)),
        ("multitouchEnabled", Value::Boolean(false)),
        ("presentationMouseEventsEnabled", Value::Boolean(true)),
        ("presentationShowsCursor", Value::Boolean(true)),
        ("presentationTouchEventsEnabled", Value::Boolean(false)),
        ("rootDocument", Value::String(root_document.to_string())),
        ("savesWindowFrame", Value::Boolean(false)),
        ("scalesToFitInPlayer", Value::Boolean(true)),
        ("showsTouches", Value::Boolean(true)),
        ("snappingEnabled", Value::Boolean(true)),
        ("timelineMarkers", Value::String("[(null)]".to_string())),
        ("touchesColor", Value::String("1 1 0 0.8".to_string())),
        ("unitsInPixelsInPlayer", Value::Boolean(true)),
    ];

    let mut dict = plist::Dictionary::new();
    for (key, value) in entries {
        dict.insert(key.to_string(), value);
    }
    Value::Dictionary(dict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::Reader;

    fn sample(frames: usize, auto_reverses: bool) -> String {
        let doc = CamlDocument {
            width: 810,
            height: 1080,
            duration: animation_duration(30.0, 2.0),
            auto_reverses,
            frames: (0..frames).map(|i| format!("assets/{i}.jpg")).collect(),
        };
        let mut out = Vec::new();
        doc.write(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_animation_duration_uses_whole_frames() {
        assert_eq!(animation_duration(30.0, 2.0), 2.0);
        assert_eq!(animation_duration(10.0, 1.25), 1.2);
        assert_eq!(animation_duration(0.0, 5.0), 0.0);
    }

    #[test]
    fn test_format_real() {
        assert_eq!(format_real(3.0), "3.0");
        assert_eq!(format_real(1.5), "1.5");
        assert_eq!(format_real(0.0), "0.0");
    }

    #[test]
    fn test_caml_vocabulary() {
        let caml = sample(3, true);
        assert!(caml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(caml.contains(r#"<caml xmlns="http://www.apple.com/CoreAnimation/1.0">"#));
        assert!(caml.contains(r#"name="_FLOATING" position="405 540""#));
        assert!(caml.contains(r#"<CATransformLayer allowsEdgeAntialiasing="1""#));
        assert!(caml.contains(r#"<contents type="CGImage" src="assets/0.jpg"/>"#));
        assert!(caml.contains(r#"type="CAKeyframeAnimation""#));
        assert!(caml.contains(r#"duration="2.0""#));
        assert!(caml.contains(r#"repeatCount="inf""#));
        assert!(caml.contains(r#"autoreverses="1""#));
        assert!(caml.contains(r#"<CGImage src="assets/2.jpg"/>"#));
        assert_eq!(caml.matches("<CGImage ").count(), 3);
        assert_eq!(caml.matches("<LKState ").count(), 3);
        assert_eq!(caml.matches("<LKStateTransition ").count(), 6);

        assert!(sample(1, false).contains(r#"autoreverses="0""#));
    }

    #[test]
    fn test_caml_is_well_formed() {
        let caml = sample(2, false);
        let mut reader = Reader::from_str(&caml);
        let mut depth = 0i32;
        loop {
            match reader.read_event().unwrap() {
                Event::Start(_) => depth += 1,
                Event::End(_) => depth -= 1,
                Event::Eof => break,
                _ => {}
            }
        }
        assert_eq!(depth, 0);
    }

    #[test]
    fn test_index_document() {
        let index = index_document(810, 1080, "main.caml");
        let dict = index.as_dictionary().unwrap();
        assert_eq!(dict.get("documentWidth").unwrap().as_real(), Some(810.0));
        assert_eq!(dict.get("documentHeight").unwrap().as_real(), Some(1080.0));
        assert_eq!(dict.get("rootDocument").unwrap().as_string(), Some("main.caml"));
        assert_eq!(dict.keys().next().map(String::as_str), Some("assetManifest"));
        assert_eq!(dict.len(), 26);
    }
}
