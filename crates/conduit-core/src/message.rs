//! Message chains: the ordered sequence of message components the gateway
//! sends and receives (spec §3 "Message chain").
//!
//! A [`MessageChain`] is a `Vec<MessageComponent>` with two special-cased
//! metadata components — [`Source`] and [`Quote`] — that, if present, occupy
//! the head of the wire form but are exposed as accessors rather than
//! iterated content (P8's "chain algebra" and spec's source-at-index-0
//! invariant).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single unit of content within a [`MessageChain`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessageComponent {
    /// Metadata: the chain's message id and send timestamp. Only ever at
    /// index 0 of the wire form; exposed via [`MessageChain::source`].
    Source {
        id: i64,
        time: i64,
    },
    /// Metadata: identifies the message this chain replies to. Only ever
    /// immediately after `Source` in the wire form; exposed via
    /// [`MessageChain::quote`].
    Quote {
        id: i64,
        #[serde(rename = "groupId")]
        group_id: i64,
        #[serde(rename = "senderId")]
        sender_id: i64,
        #[serde(rename = "targetId")]
        target_id: i64,
        origin: MessageChain,
    },
    /// Plain text.
    Plain { text: String },
    /// A mention of a single member.
    At {
        target: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display: Option<String>,
    },
    /// A mention of everyone in the group.
    AtAll,
    /// An image, identified by one of `imageId`/`url`/`path`/`base64`.
    Image {
        #[serde(rename = "imageId", default, skip_serializing_if = "Option::is_none")]
        image_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base64: Option<String>,
    },
    /// A voice clip, identified the same way as `Image`.
    Voice {
        #[serde(rename = "voiceId", default, skip_serializing_if = "Option::is_none")]
        voice_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base64: Option<String>,
    },
    /// Any component type this crate does not model explicitly. Keeps the
    /// chain round-trippable instead of failing to parse on an unrecognized
    /// component (forward compatibility with the gateway's catalog).
    #[serde(untagged)]
    Unknown(Value),
}

impl MessageComponent {
    /// A short discriminator matching the wire `type` tag, for `exclude`/typed indexing.
    pub fn kind(&self) -> &str {
        match self {
            MessageComponent::Source { .. } => "Source",
            MessageComponent::Quote { .. } => "Quote",
            MessageComponent::Plain { .. } => "Plain",
            MessageComponent::At { .. } => "At",
            MessageComponent::AtAll => "AtAll",
            MessageComponent::Image { .. } => "Image",
            MessageComponent::Voice { .. } => "Voice",
            MessageComponent::Unknown(_) => "Unknown",
        }
    }

    /// Renders this component as mirai-code (see [`mirai_code`]); only
    /// `Plain` is losslessly round-trippable (P9), others degrade to a
    /// bracketed placeholder the way the original does.
    pub fn as_mirai_code(&self) -> String {
        match self {
            MessageComponent::Plain { text } => mirai_code::serialize(text),
            MessageComponent::At { target, .. } => format!("[mirai:at:{target}]"),
            MessageComponent::AtAll => "[mirai:atall]".to_string(),
            MessageComponent::Image { image_id, .. } => {
                format!("[mirai:image:{}]", image_id.as_deref().unwrap_or(""))
            }
            MessageComponent::Voice { voice_id, .. } => {
                format!("[mirai:voice:{}]", voice_id.as_deref().unwrap_or(""))
            }
            _ => String::new(),
        }
    }
}

impl From<&str> for MessageComponent {
    fn from(s: &str) -> Self {
        MessageComponent::Plain { text: s.to_string() }
    }
}

impl From<String> for MessageComponent {
    fn from(text: String) -> Self {
        MessageComponent::Plain { text }
    }
}

/// An ordered sequence of [`MessageComponent`]s (spec §3 "Message chain").
///
/// `Source` and `Quote`, if present, are stripped off the front on
/// construction and exposed via [`Self::source`]/[`Self::quote`] rather than
/// being iterated as ordinary content — this is the invariant P8 and the
/// spec's "source occupies index 0 of the wire form" rule both describe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageChain {
    source: Option<(i64, i64)>,
    quote: Option<Box<MessageComponent>>,
    components: Vec<MessageComponent>,
}

impl MessageChain {
    /// Builds a chain from an ordered list of components, splitting off a
    /// leading `Source` and/or `Quote` into the dedicated accessors.
    pub fn new(mut components: Vec<MessageComponent>) -> Self {
        let mut source = None;
        if matches!(components.first(), Some(MessageComponent::Source { .. })) {
            if let MessageComponent::Source { id, time } = components.remove(0) {
                source = Some((id, time));
            }
        }
        let mut quote = None;
        if matches!(components.first(), Some(MessageComponent::Quote { .. })) {
            quote = Some(Box::new(components.remove(0)));
        }
        Self { source, quote, components }
    }

    /// An empty chain.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The `(message_id, timestamp)` pair from the chain's `Source`
    /// component, if the chain carried one.
    pub fn source(&self) -> Option<(i64, i64)> {
        self.source
    }

    /// The message id from `Source`, or `-1` if absent (matches the
    /// original's `message_id` property).
    pub fn message_id(&self) -> i64 {
        self.source.map(|(id, _)| id).unwrap_or(-1)
    }

    /// The chain's `Quote` component, if it carried a reply target.
    pub fn quote(&self) -> Option<&MessageComponent> {
        self.quote.as_deref()
    }

    /// Non-metadata components, in wire order.
    pub fn components(&self) -> &[MessageComponent] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// All components matching `kind` (P8: `chain[Plain]` returns all and
    /// only the plain components, in original order).
    pub fn of_kind(&self, kind: &str) -> Vec<&MessageComponent> {
        self.components.iter().filter(|c| c.kind() == kind).collect()
    }

    /// The concatenated plain text of the chain (non-`Plain` components
    /// contribute nothing), matching the original's `__str__`/`message()`.
    pub fn plain_text(&self) -> String {
        self.components
            .iter()
            .filter_map(|c| match c {
                MessageComponent::Plain { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Removes all components of the given kind, preserving the order of
    /// the rest (P8's `exclude`).
    pub fn exclude(&self, kind: &str) -> Self {
        Self {
            source: self.source,
            quote: self.quote.clone(),
            components: self.components.iter().filter(|c| c.kind() != kind).cloned().collect(),
        }
    }

    /// Appends a component, a string (as `Plain`), or another chain's
    /// components (P8: `chain + "" == chain`; associative).
    pub fn append(mut self, other: impl Into<MessageChain>) -> Self {
        self.components.extend(other.into().components);
        self
    }

    /// Serializes the chain to the wire form: a JSON array with `Source`
    /// (then `Quote`, if present) reinstated at the head.
    pub fn to_wire(&self) -> Vec<Value> {
        let mut out = Vec::with_capacity(self.components.len() + 2);
        if let Some((id, time)) = self.source {
            out.push(serde_json::json!({"type": "Source", "id": id, "time": time}));
        }
        if let Some(quote) = &self.quote {
            out.push(serde_json::to_value(quote.as_ref()).unwrap_or(Value::Null));
        }
        for c in &self.components {
            out.push(serde_json::to_value(c).unwrap_or(Value::Null));
        }
        out
    }

    /// Renders the whole chain as mirai-code (P9).
    pub fn as_mirai_code(&self) -> String {
        self.components.iter().map(|c| c.as_mirai_code()).collect()
    }
}

impl From<&str> for MessageChain {
    fn from(s: &str) -> Self {
        MessageChain::new(vec![MessageComponent::from(s)])
    }
}

impl From<String> for MessageChain {
    fn from(s: String) -> Self {
        MessageChain::new(vec![MessageComponent::from(s)])
    }
}

impl From<MessageComponent> for MessageChain {
    fn from(c: MessageComponent) -> Self {
        MessageChain::new(vec![c])
    }
}

impl From<Vec<MessageComponent>> for MessageChain {
    fn from(components: Vec<MessageComponent>) -> Self {
        MessageChain::new(components)
    }
}

impl IntoIterator for MessageChain {
    type Item = MessageComponent;
    type IntoIter = std::vec::IntoIter<MessageComponent>;

    fn into_iter(self) -> Self::IntoIter {
        self.components.into_iter()
    }
}

impl<'a> IntoIterator for &'a MessageChain {
    type Item = &'a MessageComponent;
    type IntoIter = std::slice::Iter<'a, MessageComponent>;

    fn into_iter(self) -> Self::IntoIter {
        self.components.iter()
    }
}

impl Serialize for MessageChain {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MessageChain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let components = Vec::<MessageComponent>::deserialize(deserializer)?;
        Ok(MessageChain::new(components))
    }
}

/// mirai-code: a compact textual encoding of message chains used for
/// logging and for commands that accept a plain string in place of a chain.
///
/// Grounded on `examples/original_source/mirai/models/message/base.py`.
pub mod mirai_code {
    /// Escapes the five characters `[`, `]`, `:`, `,`, `\` and the
    /// newline/carriage-return (P9).
    pub fn serialize(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for ch in s.chars() {
            match ch {
                '[' | ']' | ':' | ',' | '\\' => {
                    out.push('\\');
                    out.push(ch);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                _ => out.push(ch),
            }
        }
        out
    }

    /// Reverses [`serialize`]; for any plain string `s`,
    /// `deserialize(serialize(s)) == s` (P9).
    pub fn deserialize(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        let mut chars = s.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch == '\\' {
                match chars.peek() {
                    Some('n') => {
                        out.push('\n');
                        chars.next();
                    }
                    Some('r') => {
                        out.push('\r');
                        chars.next();
                    }
                    Some(&next) if matches!(next, '[' | ']' | ':' | ',' | '\\') => {
                        out.push(next);
                        chars.next();
                    }
                    _ => out.push(ch),
                }
            } else {
                out.push(ch);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_and_quote_split_to_head() {
        let chain = MessageChain::new(vec![
            MessageComponent::Source { id: 7, time: 100 },
            MessageComponent::Plain { text: "hi".into() },
        ]);
        assert_eq!(chain.source(), Some((7, 100)));
        assert_eq!(chain.components().len(), 1);
        assert_eq!(chain.message_id(), 7);
    }

    #[test]
    fn append_is_identity_and_associative() {
        let a: MessageChain = "a".into();
        let b: MessageChain = "b".into();
        let c: MessageChain = "c".into();
        assert_eq!(a.clone().append(""), a);
        let left = a.clone().append(b.clone()).append(c.clone());
        let right = a.append(b.append(c));
        assert_eq!(left, right);
    }

    #[test]
    fn of_kind_returns_only_matching_in_order() {
        let chain = MessageChain::new(vec![
            MessageComponent::Plain { text: "a".into() },
            MessageComponent::At { target: 1, display: None },
            MessageComponent::Plain { text: "b".into() },
        ]);
        let plains = chain.of_kind("Plain");
        assert_eq!(plains.len(), 2);
    }

    #[test]
    fn exclude_preserves_order_of_rest() {
        let chain = MessageChain::new(vec![
            MessageComponent::Plain { text: "a".into() },
            MessageComponent::At { target: 1, display: None },
            MessageComponent::Plain { text: "b".into() },
        ]);
        let excluded = chain.exclude("At");
        assert_eq!(excluded.plain_text(), "ab");
    }

    #[test]
    fn mirai_code_roundtrip_plain_text() {
        for s in ["hello", "a[b]c:d,e\\f", "line1\nline2\r"] {
            assert_eq!(mirai_code::deserialize(&mirai_code::serialize(s)), s);
        }
    }

    #[test]
    fn mirai_code_escapes_exact_charset() {
        let encoded = mirai_code::serialize("[]:,\\\n\r");
        assert_eq!(encoded, "\\[\\]\\:\\,\\\\\\n\\r");
    }
}
