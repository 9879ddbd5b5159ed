//! Documents accepted by the index writer.
//!
//! A [`Document`] is an ordered list of [`Field`]s. Each field carries a
//! [`FieldValue`] and [`FieldOptions`] saying how the writer treats it.
//!
//! ```
//! use feedrank::index::document::Document;
//!
//! let doc = Document::builder()
//!     .add_keyword("docid", "doc-1")
//!     .add_text("content", "Rust makes systems programming approachable")
//!     .build();
//!
//! assert_eq!(doc.len(), 2);
//! assert_eq!(doc.text("docid"), Some("doc-1"));
//! ```

use serde::{Deserialize, Serialize};

/// The value held by a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// UTF-8 text.
    Text(String),

    /// Opaque bytes. Never analyzed or indexed.
    Binary(Vec<u8>),
}

impl FieldValue {
    /// Get the text value, if this is a text field.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Binary(_) => None,
        }
    }

    /// Get the bytes, if this is a binary field.
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Text(_) => None,
            FieldValue::Binary(bytes) => Some(bytes),
        }
    }
}

/// How the writer treats a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOptions {
    /// Add the field's terms to the inverted index.
    pub indexed: bool,

    /// Run the value through the analyzer. Untokenized fields are indexed
    /// as a single verbatim term.
    pub tokenized: bool,

    /// Keep the raw value for retrieval.
    pub stored: bool,

    /// Keep a per-document term-frequency vector.
    pub term_vectors: bool,
}

impl FieldOptions {
    /// Analyzed, stored full text with term vectors.
    pub const TEXT: FieldOptions = FieldOptions {
        indexed: true,
        tokenized: true,
        stored: true,
        term_vectors: true,
    };

    /// A verbatim identifier: indexed as one term and stored.
    pub const KEYWORD: FieldOptions = FieldOptions {
        indexed: true,
        tokenized: false,
        stored: true,
        term_vectors: false,
    };

    /// Stored for retrieval only.
    pub const STORED: FieldOptions = FieldOptions {
        indexed: false,
        tokenized: false,
        stored: true,
        term_vectors: false,
    };
}

/// A named field of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
    pub options: FieldOptions,
}

impl Field {
    /// Create a new field.
    pub fn new<S: Into<String>>(name: S, value: FieldValue, options: FieldOptions) -> Self {
        Field {
            name: name.into(),
            value,
            options,
        }
    }
}

/// A document to be indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    fields: Vec<Field>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for constructing documents.
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::new()
    }

    /// Append a field.
    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Append an analyzed full-text field.
    pub fn add_text<S: Into<String>, T: Into<String>>(&mut self, name: S, value: T) {
        self.add_field(Field::new(
            name,
            FieldValue::Text(value.into()),
            FieldOptions::TEXT,
        ));
    }

    /// Append a stored-only text field.
    pub fn add_stored<S: Into<String>, T: Into<String>>(&mut self, name: S, value: T) {
        self.add_field(Field::new(
            name,
            FieldValue::Text(value.into()),
            FieldOptions::STORED,
        ));
    }

    /// Append a verbatim keyword field.
    pub fn add_keyword<S: Into<String>, T: Into<String>>(&mut self, name: S, value: T) {
        self.add_field(Field::new(
            name,
            FieldValue::Text(value.into()),
            FieldOptions::KEYWORD,
        ));
    }

    /// Append a stored binary field.
    pub fn add_binary<S: Into<String>>(&mut self, name: S, value: Vec<u8>) {
        self.add_field(Field::new(
            name,
            FieldValue::Binary(value),
            FieldOptions::STORED,
        ));
    }

    /// All fields in insertion order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The first field with the given name.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// The first text value with the given name.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .filter(|field| field.name == name)
            .find_map(|field| field.value.as_text())
    }

    /// The first binary value with the given name.
    pub fn binary(&self, name: &str) -> Option<&[u8]> {
        self.fields
            .iter()
            .filter(|field| field.name == name)
            .find_map(|field| field.value.as_binary())
    }

    /// Get the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A builder for constructing documents in a fluent manner.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    document: Document,
}

impl DocumentBuilder {
    /// Create a new document builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an analyzed full-text field.
    pub fn add_text<S: Into<String>, T: Into<String>>(mut self, name: S, value: T) -> Self {
        self.document.add_text(name, value);
        self
    }

    /// Add a stored-only text field.
    pub fn add_stored<S: Into<String>, T: Into<String>>(mut self, name: S, value: T) -> Self {
        self.document.add_stored(name, value);
        self
    }

    /// Add a verbatim keyword field.
    pub fn add_keyword<S: Into<String>, T: Into<String>>(mut self, name: S, value: T) -> Self {
        self.document.add_keyword(name, value);
        self
    }

    /// Add a field with explicit options.
    pub fn add_field(mut self, field: Field) -> Self {
        self.document.add_field(field);
        self
    }

    /// Build the document.
    pub fn build(self) -> Document {
        self.document
    }
}
