pub mod go;
pub mod javascript;
pub mod language;
pub mod parser;
pub mod python;
pub mod registry;
pub mod rust;
pub mod typescript;

pub use go::GoParser;
pub use javascript::JavaScriptParser;
pub use language::Language;
pub use parser::{
    LanguageParser, ParseDiagnostic, ParseResult, ParsedImport, ParsedReference,
    ParsedRelationship, ParsedSymbol,
};
pub use python::PythonParser;
pub use registry::{ParserFactory, ParserRegistry};
pub use rust::RustParser;
pub use typescript::TypeScriptParser;

use crate::config::Settings;
use crate::error::IndexResult;

/// Register every bundled parser that the settings enable.
///
/// Called once at indexer construction; the registry's lifetime equals the
/// indexer's.
pub fn register_builtin_parsers(
    registry: &mut ParserRegistry,
    settings: &Settings,
) -> IndexResult<()> {
    if settings.language_enabled(Language::Go) {
        registry.register(GoParser::factory)?;
    }
    if settings.language_enabled(Language::Python) {
        registry.register(PythonParser::factory)?;
    }
    if settings.language_enabled(Language::Rust) {
        registry.register(RustParser::factory)?;
    }
    if settings.language_enabled(Language::JavaScript) {
        registry.register(JavaScriptParser::factory)?;
    }
    if settings.language_enabled(Language::TypeScript) {
        registry.register(TypeScriptParser::factory)?;
    }
    Ok(())
}
