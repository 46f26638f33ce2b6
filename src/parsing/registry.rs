//! Parser registry: extension dispatch with priority tie-breaks.
//!
//! The registry is built once at indexer construction and read-only after.
//! It stores factories rather than live parsers so each worker can hold its
//! own parser instance; tree-sitter parsers are not shareable across threads
//! mid-parse.

use crate::error::{IndexError, IndexResult, ParseFailure};
use crate::parsing::parser::LanguageParser;
use std::collections::HashMap;
use std::path::Path;

/// Creates a fresh parser instance.
pub type ParserFactory = fn() -> Result<Box<dyn LanguageParser>, ParseFailure>;

struct Registration {
    language: String,
    extensions: Vec<String>,
    priority: i32,
    order: usize,
    factory: ParserFactory,
}

/// Maps file extensions to parsers and language tags to parsers.
#[derive(Default)]
pub struct ParserRegistry {
    registrations: Vec<Registration>,
    /// Lowercase dotted extension -> indexes into `registrations`, best first.
    by_extension: HashMap<String, Vec<usize>>,
    /// Language tag -> index into `registrations`.
    by_language: HashMap<String, usize>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parser factory.
    ///
    /// The factory is invoked once to read the parser's metadata. A second
    /// registration for an already-claimed language tag is a programmer
    /// error surfaced at startup; extensions may be claimed by several
    /// parsers and are resolved by priority.
    pub fn register(&mut self, factory: ParserFactory) -> IndexResult<()> {
        let probe = factory().map_err(|e| IndexError::Config {
            reason: format!("parser factory failed: {e}"),
        })?;
        let language = probe.language().to_string();
        if self.by_language.contains_key(&language) {
            return Err(IndexError::DuplicateLanguage { language });
        }

        let order = self.registrations.len();
        let extensions: Vec<String> = probe
            .extensions()
            .iter()
            .map(|ext| ext.to_lowercase())
            .collect();
        let priority = probe.priority();

        self.by_language.insert(language.clone(), order);
        self.registrations.push(Registration {
            language,
            extensions: extensions.clone(),
            priority,
            order,
            factory,
        });

        for ext in extensions {
            let slot = self.by_extension.entry(ext).or_default();
            slot.push(order);
            // Highest priority first; ties keep registration order.
            slot.sort_by(|&a, &b| {
                let ra = &self.registrations[a];
                let rb = &self.registrations[b];
                rb.priority.cmp(&ra.priority).then(ra.order.cmp(&rb.order))
            });
        }
        Ok(())
    }

    fn lookup(&self, path: &Path) -> Option<&Registration> {
        let ext = path.extension()?.to_str()?;
        let key = format!(".{}", ext.to_lowercase());
        let slot = self.by_extension.get(&key)?;
        slot.first().map(|&idx| &self.registrations[idx])
    }

    /// Whether any registered parser claims this path's extension.
    pub fn supports(&self, path: &Path) -> bool {
        self.lookup(path).is_some()
    }

    /// Language tag of the parser that would handle this path.
    pub fn language_for(&self, path: &Path) -> Option<&str> {
        self.lookup(path).map(|reg| reg.language.as_str())
    }

    /// Instantiate the winning parser for a path.
    ///
    /// `None` means the extension is unsupported, which the indexer treats
    /// as "skip", not as an error.
    pub fn create_for_path(
        &self,
        path: &Path,
    ) -> Option<Result<Box<dyn LanguageParser>, ParseFailure>> {
        self.lookup(path).map(|reg| (reg.factory)())
    }

    /// All registered language tags.
    pub fn languages(&self) -> Vec<&str> {
        self.registrations
            .iter()
            .map(|reg| reg.language.as_str())
            .collect()
    }

    /// All claimed extensions (lowercase, dotted).
    pub fn extensions(&self) -> Vec<&str> {
        self.by_extension.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parser::ParseResult;

    struct FakeParser {
        language: &'static str,
        extensions: &'static [&'static str],
        priority: i32,
    }

    impl LanguageParser for FakeParser {
        fn language(&self) -> &'static str {
            self.language
        }

        fn extensions(&self) -> &'static [&'static str] {
            self.extensions
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn parse(&mut self, _bytes: &[u8], _path: &Path) -> Result<ParseResult, ParseFailure> {
            Ok(ParseResult::default())
        }
    }

    fn alpha_factory() -> Result<Box<dyn LanguageParser>, ParseFailure> {
        Ok(Box::new(FakeParser {
            language: "alpha",
            extensions: &[".xy"],
            priority: 1,
        }))
    }

    fn beta_factory() -> Result<Box<dyn LanguageParser>, ParseFailure> {
        Ok(Box::new(FakeParser {
            language: "beta",
            extensions: &[".xy", ".zz"],
            priority: 5,
        }))
    }

    fn alpha_again_factory() -> Result<Box<dyn LanguageParser>, ParseFailure> {
        Ok(Box::new(FakeParser {
            language: "alpha",
            extensions: &[".aa"],
            priority: 0,
        }))
    }

    #[test]
    fn test_dispatch_by_extension() {
        let mut registry = ParserRegistry::new();
        registry.register(alpha_factory).unwrap();

        assert!(registry.supports(Path::new("file.xy")));
        assert!(registry.supports(Path::new("FILE.XY")));
        assert!(!registry.supports(Path::new("file.unknown")));
        assert!(!registry.supports(Path::new("no_extension")));
        assert_eq!(registry.language_for(Path::new("a/b/c.xy")), Some("alpha"));
    }

    #[test]
    fn test_priority_wins_tie_break() {
        let mut registry = ParserRegistry::new();
        registry.register(alpha_factory).unwrap();
        registry.register(beta_factory).unwrap();

        // beta has higher priority on the shared .xy extension
        assert_eq!(registry.language_for(Path::new("f.xy")), Some("beta"));
        assert_eq!(registry.language_for(Path::new("f.zz")), Some("beta"));
    }

    #[test]
    fn test_equal_priority_keeps_registration_order() {
        fn first() -> Result<Box<dyn LanguageParser>, ParseFailure> {
            Ok(Box::new(FakeParser {
                language: "first",
                extensions: &[".eq"],
                priority: 3,
            }))
        }
        fn second() -> Result<Box<dyn LanguageParser>, ParseFailure> {
            Ok(Box::new(FakeParser {
                language: "second",
                extensions: &[".eq"],
                priority: 3,
            }))
        }

        let mut registry = ParserRegistry::new();
        registry.register(first).unwrap();
        registry.register(second).unwrap();
        assert_eq!(registry.language_for(Path::new("f.eq")), Some("first"));
    }

    #[test]
    fn test_duplicate_language_rejected() {
        let mut registry = ParserRegistry::new();
        registry.register(alpha_factory).unwrap();

        let err = registry.register(alpha_again_factory).unwrap_err();
        assert!(matches!(
            err,
            IndexError::DuplicateLanguage { language } if language == "alpha"
        ));
    }

    #[test]
    fn test_create_for_path() {
        let mut registry = ParserRegistry::new();
        registry.register(beta_factory).unwrap();

        let parser = registry
            .create_for_path(Path::new("mod.zz"))
            .unwrap()
            .unwrap();
        assert_eq!(parser.language(), "beta");
        assert!(registry.create_for_path(Path::new("mod.txt")).is_none());
    }
}
