//! Schema resolution for raw event records
//!
//! The server delivers events in two shapes: the live stream wraps
//! everything in an envelope (`{ "payload": { "type", "properties" } }`)
//! while loaded history and test traffic arrive flat (`{ "type",
//! "properties", "sessionId", ... }`). A record is inspected exactly once at
//! ingestion and wrapped in a [`ResolvedEvent`]; downstream code only ever
//! talks to the accessors here and never re-derives the shape.
//!
//! Every accessor returns an `Option` and tolerates any missing branch.
//! There is no error path in this module: absent is absent, not broken.

use serde_json::Value;

/// The two known payload shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventShape {
    /// Live-stream envelope: fields live under `payload`
    Nested,
    /// Already-flat record: fields live at the root
    Flat,
}

impl EventShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventShape::Nested => "nested",
            EventShape::Flat => "flat",
        }
    }
}

/// A raw record plus its resolved shape.
#[derive(Debug, Clone)]
pub struct ResolvedEvent {
    shape: EventShape,
    record: Value,
}

/// One named way of digging a session id out of a record. Strategies are
/// tried in fixed order; the first non-absent result wins.
type SessionIdStrategy = (&'static str, fn(&ResolvedEvent) -> Option<&str>);

const SESSION_ID_STRATEGIES: &[SessionIdStrategy] = &[
    ("session_id", session_from_snake_field),
    ("sessionId", session_from_camel_field),
    ("properties.sessionID", session_from_properties),
    ("properties.part.sessionID", session_from_part),
    ("properties.info.sessionID", session_from_info),
];

fn session_from_snake_field(event: &ResolvedEvent) -> Option<&str> {
    str_field(event.root(), "session_id")
}

fn session_from_camel_field(event: &ResolvedEvent) -> Option<&str> {
    str_field(event.root(), "sessionId")
}

fn session_from_properties(event: &ResolvedEvent) -> Option<&str> {
    event.properties().and_then(|p| str_field(p, "sessionID"))
}

fn session_from_part(event: &ResolvedEvent) -> Option<&str> {
    event.part().and_then(|p| str_field(p, "sessionID"))
}

fn session_from_info(event: &ResolvedEvent) -> Option<&str> {
    event.info().and_then(|i| str_field(i, "sessionID"))
}

impl ResolvedEvent {
    /// Resolve a raw record's shape. Never fails: a record that is not even
    /// an object simply resolves to [`EventShape::Flat`] with every
    /// accessor returning `None`.
    ///
    /// The nested shape wins only when `payload` is present and is an
    /// object; anything else is treated as already flat.
    pub fn resolve(record: Value) -> Self {
        let shape = match record.get("payload") {
            Some(Value::Object(_)) => EventShape::Nested,
            _ => EventShape::Flat,
        };
        Self { shape, record }
    }

    pub fn shape(&self) -> EventShape {
        self.shape
    }

    /// The raw record, exactly as it arrived. Used for content hashing.
    pub fn record(&self) -> &Value {
        &self.record
    }

    /// Root of the record (the envelope for nested records).
    fn root(&self) -> &Value {
        &self.record
    }

    /// The object that carries `type` and `properties`: the payload for
    /// nested records, the record itself for flat ones.
    fn body(&self) -> &Value {
        match self.shape {
            EventShape::Nested => self.record.get("payload").unwrap_or(null()),
            EventShape::Flat => &self.record,
        }
    }

    /// The raw event type string.
    pub fn event_type(&self) -> Option<&str> {
        str_field(self.body(), "type")
    }

    /// The event's `properties` object, when present.
    pub fn properties(&self) -> Option<&Value> {
        object_field(self.body(), "properties")
    }

    /// The part payload: `properties.part` for live events, a root-level
    /// `part` for flat records.
    pub fn part(&self) -> Option<&Value> {
        self.properties()
            .and_then(|p| object_field(p, "part"))
            .or_else(|| object_field(self.body(), "part"))
    }

    /// The message info object: `properties.info` for live events, a
    /// root-level `info` for history records.
    pub fn info(&self) -> Option<&Value> {
        self.properties()
            .and_then(|p| object_field(p, "info"))
            .or_else(|| object_field(self.body(), "info"))
    }

    /// Resolve the session id via the ordered strategy list.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id_with_strategy().map(|(_, sid)| sid)
    }

    /// Resolve the session id, also reporting which strategy matched.
    pub fn session_id_with_strategy(&self) -> Option<(&'static str, &str)> {
        for (name, extract) in SESSION_ID_STRATEGIES {
            if let Some(sid) = extract(self) {
                return Some((name, sid));
            }
        }
        None
    }

    /// Resolve the message id the event addresses: explicit `messageId` or
    /// `message_id` fields first, then the live-event locations
    /// (`properties.part.messageID`, `properties.info.id`).
    pub fn message_id(&self) -> Option<&str> {
        str_field(self.root(), "messageId")
            .or_else(|| str_field(self.root(), "message_id"))
            .or_else(|| self.part().and_then(|p| str_field(p, "messageID")))
            .or_else(|| self.info().and_then(|i| str_field(i, "id")))
    }

    /// The author role string carried by a finalize event.
    pub fn role(&self) -> Option<&str> {
        str_field(self.root(), "role").or_else(|| self.info().and_then(|i| str_field(i, "role")))
    }

    /// The complete message text carried by a finalize event.
    pub fn finalized_message(&self) -> Option<&str> {
        str_field(self.root(), "finalizedMessage")
            .or_else(|| self.properties().and_then(|p| str_field(p, "finalizedMessage")))
    }

    /// Project name metadata, when the event carries it.
    pub fn project_name(&self) -> Option<&str> {
        str_field(self.root(), "projectName")
            .or_else(|| self.properties().and_then(|p| str_field(p, "projectName")))
    }

    /// Agent mode metadata, when the event carries it.
    pub fn mode(&self) -> Option<&str> {
        str_field(self.root(), "mode").or_else(|| self.info().and_then(|i| str_field(i, "mode")))
    }
}

fn null() -> &'static Value {
    static NULL: Value = Value::Null;
    &NULL
}

/// Fetch a string field from a JSON value, tolerating any other shape.
pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Fetch an object field from a JSON value, tolerating any other shape.
pub(crate) fn object_field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|v| v.is_object())
}
