//! Presentación del reporte de compilación.
//!
//! El reporte es un archivo de texto orientado a líneas con tres
//! secciones: la traza de producciones y tokens con los diagnósticos
//! intercalados, la tabla de símbolos globales y el listado de
//! instrucciones con slots numerados desde 1. El formato es estricto;
//! compilar dos veces la misma entrada produce reportes idénticos
//! byte por byte.

use std::io::{self, Write};

use crate::parse::Compilation;

/// Escribe el reporte completo de una compilación al flujo dado.
pub fn write(compilation: &Compilation, output: &mut dyn Write) -> io::Result<()> {
    for line in &compilation.trace {
        writeln!(output, "{}", line)?;
    }

    writeln!(output)?;
    writeln!(output, "Symbol Table:")?;
    writeln!(output, "{:<20}{:<20}Type", "Identifier", "MemoryLocation")?;
    for (name, global) in compilation.symbols.globals() {
        writeln!(output, "{:<20}{:<20}{:<20}", name, global.address, global.ty)?;
    }

    writeln!(output)?;
    writeln!(output, "Assembly Code Listing:")?;
    for (slot, instruction) in compilation.listing.instructions().iter().enumerate() {
        writeln!(output, "{:<10} {}", slot + 1, instruction)?;
    }

    Ok(())
}
