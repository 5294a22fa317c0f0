//! Tabla de símbolos y tipos declarados.
//!
//! La tabla mantiene una pila de ámbitos léxicos junto a un marco
//! global distinguido. Los ámbitos anidados permiten shadowing, pero
//! un mismo marco nunca admite dos declaraciones del mismo nombre.
//! Solo las entradas del marco global reciben una celda de memoria;
//! las celdas se asignan en orden de declaración a partir de una base
//! fija que forma parte del contrato con el ejecutor del listado.

use std::collections::HashMap;
use std::fmt::{self, Display};

use indexmap::IndexMap;
use thiserror::Error;

/// Primera celda de memoria asignada a variables globales.
pub const MEMORY_BASE: u32 = 10000;

/// Error al declarar un nombre.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticError {
    /// El nombre ya existe en el marco donde se declara.
    #[error("{0} already declared. Declaration unnecessary.")]
    AlreadyDeclared(String),
}

/// Tipo declarado de una variable, parámetro o expresión.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Integer,
    Boolean,

    /// Tipo indeterminado; ocurre ante nombres no declarados y
    /// funciones cuyo tipo de retorno todavía no se conoce.
    Unknown,
}

impl Type {
    pub fn as_str(self) -> &'static str {
        match self {
            Type::Integer => "integer",
            Type::Boolean => "boolean",
            Type::Unknown => "unknown",
        }
    }

    /// Tipo que denota un calificador (`integer` o `boolean`).
    pub fn from_qualifier(lexeme: &str) -> Type {
        match lexeme {
            "integer" => Type::Integer,
            "boolean" => Type::Boolean,
            _ => Type::Unknown,
        }
    }
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.pad(self.as_str())
    }
}

/// Entrada del marco global: tipo declarado y celda de memoria.
#[derive(Copy, Clone, Debug)]
pub struct Global {
    pub ty: Type,
    pub address: u32,
}

/// Descriptor de una función definida por el usuario.
///
/// El tipo de retorno comienza como [`Type::Unknown`] y se refina con
/// la primera sentencia `return` que aparece dentro del cuerpo.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub params: Vec<(String, Type)>,
    pub return_type: Type,
}

/// Pila de ámbitos léxicos más el marco global.
#[derive(Default)]
pub struct SymbolTable {
    scopes: Vec<HashMap<String, Type>>,
    globals: IndexMap<String, Global>,
}

impl SymbolTable {
    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn exit_scope(&mut self) {
        self.scopes.pop();
    }

    /// Declara un nombre en el marco activo.
    ///
    /// Con la pila de ámbitos vacía, la declaración cae al marco global
    /// y recibe la siguiente celda de memoria. Un duplicado conserva la
    /// entrada original.
    pub fn declare(&mut self, name: &str, ty: Type) -> Result<(), SemanticError> {
        match self.scopes.last_mut() {
            Some(scope) => {
                if scope.contains_key(name) {
                    return Err(SemanticError::AlreadyDeclared(name.to_owned()));
                }

                scope.insert(name.to_owned(), ty);
            }

            None => {
                if self.globals.contains_key(name) {
                    return Err(SemanticError::AlreadyDeclared(name.to_owned()));
                }

                let address = MEMORY_BASE + self.globals.len() as u32;
                self.globals.insert(name.to_owned(), Global { ty, address });
            }
        }

        Ok(())
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.type_of(name).is_some()
    }

    /// Tipo de un nombre, buscando del ámbito más interno hacia afuera
    /// y por último en el marco global.
    pub fn type_of(&self, name: &str) -> Option<Type> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
            .or_else(|| self.globals.get(name).map(|global| global.ty))
    }

    /// Celda de memoria de un nombre. Solo las globales tienen una.
    pub fn address_of(&self, name: &str) -> Option<u32> {
        self.globals.get(name).map(|global| global.address)
    }

    /// Entradas globales en orden de declaración.
    pub fn globals(&self) -> impl Iterator<Item = (&str, &Global)> {
        self.globals.iter().map(|(name, global)| (name.as_str(), global))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globals_get_contiguous_cells_in_declaration_order() {
        let mut table = SymbolTable::default();
        table.declare("a", Type::Integer).unwrap();
        table.declare("b", Type::Boolean).unwrap();
        table.declare("c", Type::Integer).unwrap();

        let cells: Vec<(String, u32)> = table
            .globals()
            .map(|(name, global)| (name.to_owned(), global.address))
            .collect();

        assert_eq!(
            cells,
            vec![
                ("a".to_owned(), 10000),
                ("b".to_owned(), 10001),
                ("c".to_owned(), 10002),
            ]
        );
    }

    #[test]
    fn duplicates_are_rejected_per_frame() {
        let mut table = SymbolTable::default();
        table.declare("x", Type::Integer).unwrap();
        assert!(table.declare("x", Type::Boolean).is_err());

        // La entrada original sobrevive
        assert_eq!(table.type_of("x"), Some(Type::Integer));
        assert_eq!(table.address_of("x"), Some(10000));
    }

    #[test]
    fn shadowing_does_not_touch_outer_bindings() {
        let mut table = SymbolTable::default();
        table.declare("x", Type::Integer).unwrap();

        table.enter_scope();
        table.declare("x", Type::Boolean).unwrap();
        assert_eq!(table.type_of("x"), Some(Type::Boolean));

        table.exit_scope();
        assert_eq!(table.type_of("x"), Some(Type::Integer));
    }

    #[test]
    fn lookup_walks_scopes_before_globals() {
        let mut table = SymbolTable::default();
        table.declare("g", Type::Integer).unwrap();

        table.enter_scope();
        table.declare("local", Type::Boolean).unwrap();
        table.enter_scope();

        assert!(table.is_declared("local"));
        assert!(table.is_declared("g"));
        assert!(!table.is_declared("nope"));

        // Las locales no reciben celda
        assert_eq!(table.address_of("local"), None);

        table.exit_scope();
        table.exit_scope();
        assert!(!table.is_declared("local"));
    }
}
