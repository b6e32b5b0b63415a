//! Corpus load primitive.
//!
//! A [`CorpusSource`] hands the engine the raw method listing of one loaded
//! package. It is invoked once per session; the engine never decodes the
//! binary container itself.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::errors::{DexprintError, Result};
use crate::core::method::{AccessFlags, Instruction, MethodDef};

/// Raw listing returned by a [`CorpusSource`].
#[derive(Debug, Clone, Default)]
pub struct MethodListing {
    /// Package name, if known
    pub package: Option<String>,
    /// Every method, in listing order
    pub methods: Vec<MethodDef>,
}

/// External provider of the decompiled method listing.
#[async_trait]
pub trait CorpusSource: Send + Sync {
    /// Human-readable description for logging
    fn describe(&self) -> String;

    /// Return every method with its raw attributes
    async fn load_methods(&self) -> Result<MethodListing>;
}

/// On-disk listing format: classes with their methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingFile {
    /// Package name
    #[serde(default)]
    pub package: Option<String>,
    /// Class definitions
    #[serde(default)]
    pub classes: Vec<ListedClass>,
}

/// One class of a [`ListingFile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListedClass {
    /// Class type descriptor
    pub name: String,
    /// Methods declared by the class
    #[serde(default)]
    pub methods: Vec<ListedMethod>,
}

/// A method as listed under its class; the class is implied by the parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListedMethod {
    /// Method name
    pub name: String,
    /// Access flags
    #[serde(default = "AccessFlags::empty")]
    pub access_flags: AccessFlags,
    /// Parameter type descriptors
    #[serde(default)]
    pub parameter_types: Vec<String>,
    /// Return type descriptor
    pub return_type: String,
    /// Instruction stream
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

impl ListedMethod {
    fn into_method(self, class: &str) -> MethodDef {
        MethodDef {
            defining_class: class.to_string(),
            name: self.name,
            access_flags: self.access_flags,
            parameter_types: self.parameter_types,
            return_type: self.return_type,
            instructions: self.instructions,
        }
    }
}

impl ListingFile {
    /// Flatten classes into a method listing
    pub fn into_listing(self) -> MethodListing {
        let methods = self
            .classes
            .into_iter()
            .flat_map(|class| {
                let ListedClass { name, methods } = class;
                methods
                    .into_iter()
                    .map(move |method| method.into_method(&name))
            })
            .collect();

        MethodListing {
            package: self.package,
            methods,
        }
    }
}

/// Reads a JSON [`ListingFile`] from disk.
#[derive(Debug, Clone)]
pub struct JsonCorpusSource {
    path: PathBuf,
}

impl JsonCorpusSource {
    /// Create a source for the given listing file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Listing file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CorpusSource for JsonCorpusSource {
    fn describe(&self) -> String {
        format!("JSON listing {}", self.path.display())
    }

    async fn load_methods(&self) -> Result<MethodListing> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            DexprintError::io(
                format!("Failed to read corpus listing: {}", self.path.display()),
                e,
            )
        })?;

        let file: ListingFile = serde_json::from_str(&content)?;
        let listing = file.into_listing();
        debug!(
            "Read {} methods from {}",
            listing.methods.len(),
            self.path.display()
        );
        Ok(listing)
    }
}

/// Source over methods already in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpusSource {
    listing: MethodListing,
}

impl InMemoryCorpusSource {
    /// Wrap an existing method list
    pub fn new(package: Option<String>, methods: Vec<MethodDef>) -> Self {
        Self {
            listing: MethodListing { package, methods },
        }
    }
}

#[async_trait]
impl CorpusSource for InMemoryCorpusSource {
    fn describe(&self) -> String {
        format!("{} in-memory methods", self.listing.methods.len())
    }

    async fn load_methods(&self) -> Result<MethodListing> {
        Ok(self.listing.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::method::Opcode;
    use tempfile::NamedTempFile;

    const LISTING: &str = r#"{
        "package": "com.app",
        "classes": [
            {
                "name": "Lcom/app/Player;",
                "methods": [
                    {
                        "name": "seek",
                        "access_flags": "PUBLIC | FINAL",
                        "parameter_types": ["J"],
                        "return_type": "Z",
                        "instructions": [
                            {"opcode": "CONST_STRING", "reference": {"kind": "string", "value": "seek"}},
                            {"opcode": "RETURN"}
                        ]
                    },
                    {"name": "<init>", "access_flags": ["PUBLIC", "CONSTRUCTOR"], "return_type": "V"}
                ]
            },
            {"name": "Lcom/app/Empty;"}
        ]
    }"#;

    #[tokio::test]
    async fn test_json_listing_is_flattened() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), LISTING).unwrap();

        let listing = JsonCorpusSource::new(file.path()).load_methods().await.unwrap();

        assert_eq!(listing.package.as_deref(), Some("com.app"));
        assert_eq!(listing.methods.len(), 2);
        let seek = &listing.methods[0];
        assert_eq!(seek.defining_class, "Lcom/app/Player;");
        assert_eq!(seek.access_flags, AccessFlags::PUBLIC | AccessFlags::FINAL);
        assert_eq!(seek.instructions[1].opcode, Opcode::Return);
        assert_eq!(
            listing.methods[1].access_flags,
            AccessFlags::PUBLIC | AccessFlags::CONSTRUCTOR
        );
    }

    #[tokio::test]
    async fn test_missing_listing_is_io_error() {
        let err = JsonCorpusSource::new("/nonexistent/listing.json")
            .load_methods()
            .await
            .unwrap_err();
        assert!(matches!(err, DexprintError::Io { .. }));
    }

    #[tokio::test]
    async fn test_malformed_listing_is_serialization_error() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{\"classes\": 3}").unwrap();

        let err = JsonCorpusSource::new(file.path())
            .load_methods()
            .await
            .unwrap_err();
        assert!(matches!(err, DexprintError::Serialization { .. }));
    }
}
