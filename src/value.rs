//! Literals and the `Use` sum: typed references from a consumer to the
//! value it consumes.

use crate::arena::Id;
use crate::inst::InstructionKind;
use crate::ir::{ArgumentData, FunctionData, GlobalValueData, InstructionData};
use crate::ty::Type;

/// A scalar constant: a bool, a fixed-width integer, or a float.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScalarLiteral {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl ScalarLiteral {
    #[must_use]
    pub fn render(self) -> String {
        match self {
            ScalarLiteral::Bool(b) => b.to_string(),
            ScalarLiteral::Int(i) => i.to_string(),
            ScalarLiteral::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{:.1}", f)
                } else {
                    f.to_string()
                }
            }
        }
    }
}

/// A tensor or scalar constant.
///
/// `Elements` is intentionally untyped about shape: the shape it fills
/// is whatever the surrounding `Use`'s ascribed [`Type`] says, matching
/// the way a literal's type is only pinned down at its use site (§3,
/// invariant 3).
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Scalar(ScalarLiteral),
    Repeating(ScalarLiteral),
    Elements(Vec<ScalarLiteral>),
    Random { from: ScalarLiteral, to: ScalarLiteral },
}

impl Literal {
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Literal::Scalar(s) => s.render(),
            Literal::Repeating(v) => format!("repeating {}", v.render()),
            Literal::Elements(xs) => {
                let joined = xs.iter().map(|x| x.render()).collect::<Vec<_>>().join(", ");
                format!("elements [ {} ]", joined)
            }
            Literal::Random { from, to } => format!("random from {} to {}", from.render(), to.render()),
        }
    }
}

/// A typed reference to a producer of a value.
///
/// Every variant carries the [`Type`] the reference is used *as* at this
/// site; per invariant 3, that type must equal the referent's own
/// declared type (for `Literal`, the carried type is instead the
/// ascription the literal is checked against).
#[derive(Clone, Debug)]
pub enum Use {
    Argument(Type, Id<ArgumentData>),
    Instruction(Type, Id<InstructionData>),
    Global(Type, Id<GlobalValueData>),
    Function(Type, Id<FunctionData>),
    Literal(Type, Literal),
    /// A value computed directly from a compile-time-constant
    /// instruction expression, rather than referencing a linked
    /// instruction in some block (see DESIGN.md for the open question
    /// this variant resolves).
    Constant(Type, Box<InstructionKind>),
}

impl Use {
    /// The type this use carries at its reference site.
    #[must_use]
    pub fn ascribed_type(&self) -> &Type {
        match self {
            Use::Argument(t, _)
            | Use::Instruction(t, _)
            | Use::Global(t, _)
            | Use::Function(t, _)
            | Use::Literal(t, _)
            | Use::Constant(t, _) => t,
        }
    }
}
