//! Acumulación de diagnósticos.

use std::fmt::{self, Display};

/// Un error detectado durante la compilación, junto a la línea del
/// texto fuente donde fue descubierto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: u32,
    pub message: String,
}

impl Display for Diagnostic {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "Syntax error at line {}: {}", self.line, self.message)
    }
}

/// Colección append-only de diagnósticos, en orden de descubrimiento.
///
/// La compilación nunca se detiene ante errores; este objeto los
/// registra y los cuenta para el resumen final.
#[derive(Default)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics(entries) = self;
        if entries.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for diagnostic in entries {
            writeln!(fmt, "{}", diagnostic)?;
        }

        let error_or_errors = if entries.len() == 1 { "error" } else { "errors" };
        writeln!(
            fmt,
            "Parsing completed with {} {}",
            entries.len(),
            error_or_errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_render_with_line_tags() {
        let diagnostic = Diagnostic {
            line: 3,
            message: "Relational operator expected".to_owned(),
        };

        assert_eq!(
            diagnostic.to_string(),
            "Syntax error at line 3: Relational operator expected"
        );
    }

    #[test]
    fn summary_counts_entries() {
        let mut diagnostics = Diagnostics::default();
        assert!(diagnostics.is_empty());
        assert_eq!(diagnostics.to_string(), "No errors were reported\n");

        diagnostics.push(Diagnostic {
            line: 1,
            message: "uno".to_owned(),
        });
        diagnostics.push(Diagnostic {
            line: 2,
            message: "dos".to_owned(),
        });

        assert!(!diagnostics.is_empty());
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.to_string().ends_with("Parsing completed with 2 errors\n"));
    }
}
