//! Listado de instrucciones de máquina de pila.
//!
//! El código objetivo es lineal y recuerda ligeramente a lenguajes
//! ensambladores. Cada instrucción ocupa un slot numerado desde 1 en
//! el listado final; una vez agregada, su slot nunca cambia.
//!
//! # Saltos y etiquetas
//! El control de flujo se realiza a través de saltos cuyos operandos
//! son números de slot. Las instrucciones `LABEL` no tienen efecto,
//! pero ocupan un slot que sirve como destino. Los saltos hacia
//! adelante se agregan sin destino y se resuelven en cuanto la
//! etiqueta correspondiente es emitida.

use std::fmt::{self, Display};

/// Una instrucción de la máquina de pila objetivo.
///
/// Los saltos almacenan su destino como número de slot 1-based; un
/// destino ausente todavía no ha sido resuelto y se muestra como `TBD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Empuja una constante entera. El operando preserva el lexema.
    PushImm(String),

    /// Empuja el contenido de una celda de memoria.
    PushMem(u32),

    /// Extrae el tope de la pila hacia una celda de memoria.
    PopMem(u32),

    /// Lee un entero de la entrada y lo empuja.
    StdIn,

    /// Extrae el tope de la pila y lo escribe a la salida.
    StdOut,

    /// Aritmética: extrae dos operandos y empuja el resultado.
    Add,
    Sub,
    Mul,
    Div,

    /// Comparación: extrae dos operandos y empuja 0 o 1.
    Equal,
    NotEqual,
    Greater,
    Less,
    LessEqual,
    GreaterEqual,

    /// Extrae el tope; salta al slot indicado si es cero.
    JumpIfZero(Option<usize>),

    /// Salta incondicionalmente al slot indicado.
    Jump(Option<usize>),

    /// Marcador sin efecto que ocupa un slot como destino de saltos.
    Label,
}

impl Display for Instruction {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match self {
            PushImm(lexeme) => write!(fmt, "{:<10}{}", "PUSHI", lexeme),
            PushMem(address) => write!(fmt, "{:<10}{}", "PUSHM", address),
            PopMem(address) => write!(fmt, "{:<10}{}", "POPM", address),
            StdIn => fmt.write_str("SIN"),
            StdOut => fmt.write_str("SOUT"),
            Add => fmt.write_str("A"),
            Sub => fmt.write_str("S"),
            Mul => fmt.write_str("M"),
            Div => fmt.write_str("D"),
            Equal => fmt.write_str("EQU"),
            NotEqual => fmt.write_str("NEQ"),
            Greater => fmt.write_str("GRT"),
            Less => fmt.write_str("LES"),
            LessEqual => fmt.write_str("LEQ"),
            GreaterEqual => fmt.write_str("GEQ"),
            JumpIfZero(target) => jump(fmt, "JMP0", *target),
            Jump(target) => jump(fmt, "JMP", *target),
            Label => fmt.write_str("LABEL"),
        }
    }
}

fn jump(fmt: &mut fmt::Formatter<'_>, mnemonic: &str, target: Option<usize>) -> fmt::Result {
    match target {
        Some(slot) => write!(fmt, "{:<10}{}", mnemonic, slot),
        None => write!(fmt, "{:<10}TBD", mnemonic),
    }
}

/// Vector append-only de instrucciones con resolución de saltos.
#[derive(Default)]
pub struct Listing {
    body: Vec<Instruction>,
}

impl Listing {
    /// Agrega una instrucción y retorna el slot 0-based que ocupa.
    pub fn push(&mut self, instruction: Instruction) -> usize {
        self.body.push(instruction);
        self.body.len() - 1
    }

    /// Resuelve el destino de un salto emitido previamente.
    ///
    /// El destino registrado es el número de slot 1-based de la
    /// etiqueta indicada por su slot 0-based.
    pub fn patch(&mut self, jump: usize, label: usize) {
        match &mut self.body[jump] {
            Instruction::JumpIfZero(target) | Instruction::Jump(target) => {
                *target = Some(label + 1);
            }

            other => unreachable!("bad patch(): slot {} holds {:?}", jump, other),
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.body
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Determina si el listado todavía contiene saltos sin resolver.
    pub fn has_unresolved_jumps(&self) -> bool {
        self.body.iter().any(|instruction| {
            matches!(
                instruction,
                Instruction::JumpIfZero(None) | Instruction::Jump(None)
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_render_with_tabulated_operands() {
        assert_eq!(Instruction::PushImm("5".to_owned()).to_string(), "PUSHI     5");
        assert_eq!(Instruction::PushMem(10000).to_string(), "PUSHM     10000");
        assert_eq!(Instruction::PopMem(10001).to_string(), "POPM      10001");
        assert_eq!(Instruction::StdIn.to_string(), "SIN");
        assert_eq!(Instruction::StdOut.to_string(), "SOUT");
        assert_eq!(Instruction::Add.to_string(), "A");
        assert_eq!(Instruction::GreaterEqual.to_string(), "GEQ");
        assert_eq!(Instruction::Label.to_string(), "LABEL");
    }

    #[test]
    fn unresolved_jumps_render_as_tbd() {
        assert_eq!(Instruction::JumpIfZero(None).to_string(), "JMP0      TBD");
        assert_eq!(Instruction::Jump(None).to_string(), "JMP       TBD");
        assert_eq!(Instruction::JumpIfZero(Some(8)).to_string(), "JMP0      8");
        assert_eq!(Instruction::Jump(Some(11)).to_string(), "JMP       11");
    }

    #[test]
    fn patching_targets_the_label_slot_plus_one() {
        let mut listing = Listing::default();
        let jump = listing.push(Instruction::JumpIfZero(None));
        listing.push(Instruction::Add);
        let label = listing.push(Instruction::Label);

        assert!(listing.has_unresolved_jumps());
        listing.patch(jump, label);
        assert!(!listing.has_unresolved_jumps());

        assert_eq!(listing.instructions()[jump], Instruction::JumpIfZero(Some(3)));
    }
}
