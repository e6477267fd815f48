//! Persistence: a symbol's annotation list ↔ a JSON string in a key-value store.
//!
//! The store is an external collaborator with a synchronous get/set string
//! interface. Each symbol is written under `"<symbol>-drawings"` as a JSON
//! array of [`AnnotationRecord`]s. Records are decoded one at a time so a
//! single bad record (unknown shape, malformed point) is skipped without
//! losing its neighbours.

use crate::annotation::Annotation;
use crate::error::PersistError;
use crate::id::{AnnotationId, Symbol};
use crate::model::{ControlPoints, DrawingPoint};
use crate::shape::ShapeKind;
use crate::style::StyleOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Synchronous string store provided by the host.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
}

/// In-memory store. Handy for tests and for hosts without durable storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }
}

fn default_visible() -> bool {
    true
}

/// One persisted annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    pub id: String,
    pub symbol: String,
    /// Kept as a string so unknown kinds can be reported and skipped.
    pub shape_kind: String,
    #[serde(default)]
    pub style_options: Value,
    pub control_points: Vec<DrawingPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds_per_bar: Option<f64>,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl From<&Annotation> for AnnotationRecord {
    fn from(a: &Annotation) -> Self {
        Self {
            id: a.id().as_str().to_string(),
            symbol: a.symbol().as_str().to_string(),
            shape_kind: a.kind().as_str().to_string(),
            style_options: a.style().to_value(),
            control_points: a.points().to_vec(),
            text: a.text().map(str::to_string),
            seconds_per_bar: a.seconds_per_bar(),
            is_visible: a.is_visible(),
            tags: a.tags().to_vec(),
            user_id: a.user_id().map(str::to_string),
        }
    }
}

impl AnnotationRecord {
    /// Rebuild the annotation. The style is normalized field by field, so
    /// only the kind and the control points can make a record invalid.
    pub fn into_annotation(self, symbol: Symbol) -> Result<Annotation, PersistError> {
        let kind = ShapeKind::parse(&self.shape_kind)
            .ok_or_else(|| PersistError::UnknownShapeKind(self.shape_kind.clone()))?;
        let expected = kind.spec().stored_points;
        if self.control_points.len() != expected {
            return Err(PersistError::PointCount {
                kind,
                expected,
                found: self.control_points.len(),
            });
        }
        if let Some(index) = self.control_points.iter().position(|p| !p.is_finite()) {
            return Err(PersistError::NonFinitePoint { index });
        }
        if self.symbol != symbol.as_str() {
            log::warn!(
                "record {} claims symbol `{}`, loading it under `{symbol}`",
                self.id,
                self.symbol
            );
        }
        let mut annotation = Annotation::restore(
            AnnotationId::intern(&self.id),
            symbol,
            kind,
            self.control_points.into_iter().collect::<ControlPoints>(),
            StyleOptions::from_value(kind, &self.style_options),
            self.text.filter(|t| !t.is_empty()),
            None,
            self.is_visible,
            self.tags,
            self.user_id,
        );
        annotation.set_seconds_per_bar(self.seconds_per_bar);
        Ok(annotation)
    }
}

/// Reads and writes symbol lists through a [`KeyValueStore`].
pub struct PersistenceAdapter {
    store: Box<dyn KeyValueStore>,
    suffix: String,
}

impl PersistenceAdapter {
    pub fn new(store: Box<dyn KeyValueStore>, suffix: impl Into<String>) -> Self {
        Self {
            store,
            suffix: suffix.into(),
        }
    }

    /// Storage key for a symbol, e.g. `BTCUSDT-drawings`.
    pub fn key(&self, symbol: Symbol) -> String {
        format!("{}{}", symbol.as_str(), self.suffix)
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// Load every valid annotation stored for `symbol`. Invalid records are
    /// logged and skipped; a missing or unreadable entry yields an empty list.
    pub fn load(&self, symbol: Symbol) -> Vec<Annotation> {
        let key = self.key(symbol);
        let Some(json) = self.store.get(&key) else {
            return Vec::new();
        };
        let raw: Vec<Value> = match serde_json::from_str(&json) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("`{key}` is not a JSON array, ignoring it: {e}");
                return Vec::new();
            }
        };

        let mut out = Vec::with_capacity(raw.len());
        for (i, value) in raw.into_iter().enumerate() {
            let decoded = serde_json::from_value::<AnnotationRecord>(value)
                .map_err(PersistError::from)
                .and_then(|record| record.into_annotation(symbol));
            match decoded {
                Ok(annotation) => out.push(annotation),
                Err(e) => log::warn!("skipping record {i} of `{key}`: {e}"),
            }
        }
        log::debug!("loaded {} annotation(s) for {symbol}", out.len());
        out
    }

    /// Write the completed annotations of `symbol`.
    pub fn save<'a>(
        &mut self,
        symbol: Symbol,
        annotations: impl IntoIterator<Item = &'a Annotation>,
    ) -> Result<(), PersistError> {
        let records: Vec<AnnotationRecord> = annotations
            .into_iter()
            .filter(|a| a.is_completed())
            .map(AnnotationRecord::from)
            .collect();
        let json = serde_json::to_string(&records)?;
        let key = self.key(symbol);
        log::trace!("persist `{key}` ({} record(s))", records.len());
        self.store.set(&key, json);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Time;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const EXTEND: Time = Time(1.0e9);

    fn pt(t: f64, p: f64) -> DrawingPoint {
        DrawingPoint::new(Time(t), p)
    }

    fn adapter(store: MemoryStore) -> PersistenceAdapter {
        PersistenceAdapter::new(Box::new(store), "-drawings")
    }

    fn annotation(kind: ShapeKind, symbol: Symbol, clicks: &[DrawingPoint]) -> Annotation {
        let mut a = Annotation::new(kind, symbol);
        for p in clicks {
            a.add_point(*p, EXTEND);
        }
        a
    }

    #[test]
    fn roundtrip_preserves_points_style_and_kind() {
        let sym = Symbol::intern("ROUNDTRIP");
        let mut rect = annotation(ShapeKind::Rectangle, sym, &[pt(100.0, 50.0), pt(200.0, 80.0)]);
        rect.apply_style_patch(&json!({ "fillColor": "#123456", "borderWidth": 2 }));
        rect.set_text(Some("zone".into()));
        rect.set_tags(vec!["swing".into(), "weekly".into()]);
        rect.set_user_id(Some("user-42".into()));
        let ray = annotation(ShapeKind::HorizontalRay, sym, &[pt(10.0, 7.5)]);
        let fib = annotation(ShapeKind::Fibonacci, sym, &[pt(1.0, 10.0), pt(5.0, 20.0)]);

        let mut persist = adapter(MemoryStore::new());
        persist.save(sym, [&rect, &ray, &fib]).unwrap();
        let loaded = persist.load(sym);

        assert_eq!(loaded.len(), 3);
        for (before, after) in [&rect, &ray, &fib].into_iter().zip(&loaded) {
            assert_eq!(after.id(), before.id());
            assert_eq!(after.kind(), before.kind());
            assert_eq!(after.points(), before.points());
            assert_eq!(after.style(), before.style());
            assert!(after.is_completed());
        }
        assert_eq!(loaded[0].text(), Some("zone"));
        assert_eq!(loaded[0].tags(), ["swing", "weekly"]);
        assert_eq!(loaded[0].user_id(), Some("user-42"));
        assert!(loaded[1].tags().is_empty());
        assert_eq!(loaded[1].user_id(), None);

        let stored: serde_json::Value =
            serde_json::from_str(&persist.store().get("ROUNDTRIP-drawings").unwrap()).unwrap();
        assert_eq!(stored[0]["tags"], json!(["swing", "weekly"]));
        assert_eq!(stored[0]["userId"], "user-42");
        assert!(stored[1].get("userId").is_none());
    }

    #[test]
    fn unknown_kind_is_skipped_and_rest_load() {
        let sym = Symbol::intern("SKIPPY");
        let json = json!([
            { "id": "a", "symbol": "SKIPPY", "shapeKind": "triangle",
              "controlPoints": [{ "time": 1, "price": 1 }] },
            { "id": "b", "symbol": "SKIPPY", "shapeKind": "line",
              "controlPoints": [{ "time": 1, "price": 1 }, { "time": 2, "price": 3 }] },
            { "id": "c", "symbol": "SKIPPY", "shapeKind": "line",
              "controlPoints": "garbage" },
            { "id": "d", "symbol": "SKIPPY", "shapeKind": "vertical-line",
              "controlPoints": [{ "time": 4, "price": 0 }], "isVisible": false }
        ]);
        let persist = adapter(MemoryStore::new().with_entry("SKIPPY-drawings", &json.to_string()));
        let loaded = persist.load(sym);
        let ids: Vec<String> = loaded.iter().map(|a| a.id().as_str().to_owned()).collect();
        assert_eq!(ids, vec!["b", "d"]);
        assert!(!loaded[1].is_visible());
    }

    #[test]
    fn wrong_point_count_is_rejected() {
        let record = AnnotationRecord {
            id: "x".into(),
            symbol: "S".into(),
            shape_kind: "rectangle".into(),
            style_options: Value::Null,
            control_points: vec![pt(1.0, 1.0)],
            text: None,
            seconds_per_bar: None,
            is_visible: true,
            tags: vec![],
            user_id: None,
        };
        let err = record.into_annotation(Symbol::intern("S")).unwrap_err();
        assert!(matches!(err, PersistError::PointCount { expected: 2, found: 1, .. }));
    }

    #[test]
    fn corrupt_entry_loads_nothing() {
        let persist = adapter(MemoryStore::new().with_entry("BAD-drawings", "{not json"));
        assert!(persist.load(Symbol::intern("BAD")).is_empty());
    }

    #[test]
    fn record_uses_camel_case_field_names() {
        let sym = Symbol::intern("FIELDS");
        let mut line = annotation(ShapeKind::Line, sym, &[pt(1.0, 1.0), pt(2.0, 2.0)]);
        line.set_seconds_per_bar(Some(60.0));
        let value = serde_json::to_value(AnnotationRecord::from(&line)).unwrap();
        let fields = [
            "id",
            "symbol",
            "shapeKind",
            "styleOptions",
            "controlPoints",
            "secondsPerBar",
            "isVisible",
        ];
        for field in fields {
            assert!(value.get(field).is_some(), "missing `{field}`");
        }
    }

    #[test]
    fn in_progress_annotations_are_not_saved() {
        let sym = Symbol::intern("PARTIAL");
        let partial = annotation(ShapeKind::Line, sym, &[pt(1.0, 1.0)]);
        let mut persist = adapter(MemoryStore::new());
        persist.save(sym, [&partial]).unwrap();
        assert_eq!(persist.store().get("PARTIAL-drawings").as_deref(), Some("[]"));
    }
}
