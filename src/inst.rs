//! Instruction kinds and their result-typing rules.

use crate::arena::Id;
use crate::ir::BasicBlockData;
use crate::ty::{BroadcastingConfig, DataType, ElementKey, Shape, Type};
use crate::value::Use;

/// Binary arithmetic, boolean and comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    And,
    Or,
    Xor,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl BinaryOp {
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterEqual
        )
    }

    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Subtract => "subtract",
            BinaryOp::Multiply => "multiply",
            BinaryOp::Divide => "divide",
            BinaryOp::Power => "power",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Equal => "equal",
            BinaryOp::NotEqual => "notEqual",
            BinaryOp::LessThan => "lessThan",
            BinaryOp::LessEqual => "lessEqual",
            BinaryOp::GreaterThan => "greaterThan",
            BinaryOp::GreaterEqual => "greaterEqual",
        }
    }
}

/// Unary elementwise transforms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    Not,
    Sqrt,
    Square,
    Exp,
    Log,
    Sin,
    Cos,
    Tanh,
    Sigmoid,
    Relu,
    Abs,
}

impl UnaryOp {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            UnaryOp::Negate => "negate",
            UnaryOp::Not => "not",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Square => "square",
            UnaryOp::Exp => "exp",
            UnaryOp::Log => "log",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tanh => "tanh",
            UnaryOp::Sigmoid => "sigmoid",
            UnaryOp::Relu => "relu",
            UnaryOp::Abs => "abs",
        }
    }
}

/// The associative function reduced or scanned over an axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssociativeOp {
    Sum,
    Product,
    Max,
    Min,
    Mean,
    And,
    Or,
}

impl AssociativeOp {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            AssociativeOp::Sum => "sum",
            AssociativeOp::Product => "product",
            AssociativeOp::Max => "max",
            AssociativeOp::Min => "min",
            AssociativeOp::Mean => "mean",
            AssociativeOp::And => "and",
            AssociativeOp::Or => "or",
        }
    }
}

/// Which side of a branch target a [`InstructionKind::Conditional`] jumps
/// to, bundled with the block argument list.
#[derive(Clone, Debug)]
pub struct BranchTarget {
    pub block: Id<BasicBlockData>,
    pub arguments: Vec<Use>,
}

/// The closed sum of every operation an instruction may perform.
///
/// Each variant's result type is computed by [`InstructionKind::result_type`]
/// from its operands alone, never from surrounding context — this is what
/// lets the builder type every instruction it creates on the spot.
#[derive(Clone, Debug)]
pub enum InstructionKind {
    Binary { op: BinaryOp, lhs: Use, rhs: Use, broadcasting: Option<BroadcastingConfig> },
    Unary { op: UnaryOp, operand: Use },
    MatrixMultiply { lhs: Use, rhs: Use },
    Transpose { operand: Use },
    Reduce { op: AssociativeOp, operand: Use, axis: usize },
    Scan { op: AssociativeOp, operand: Use, axis: usize },
    Concatenate { operands: Vec<Use>, axis: usize },
    ShapeCast { operand: Use, shape: Shape },
    DataTypeCast { operand: Use, data_type: DataType },
    Tuple { elements: Vec<Use> },
    Extract { source: Use, keys: Vec<ElementKey> },
    Insert { value: Use, destination: Use, keys: Vec<ElementKey> },
    ElementPointer { source: Use, keys: Vec<ElementKey> },
    Load { pointer: Use },
    Store { value: Use, destination: Use },
    AllocateHeap { element_type: Type, count: Use },
    AllocateBox { element_type: Type },
    ProjectBox { boxed: Use },
    Deallocate { value: Use },
    Apply { callee: Use, arguments: Vec<Use> },
    Gradient { function: Use, output: Use, with_respect_to: Vec<usize>, keeping: Vec<usize> },
    Branch { target: BranchTarget },
    Conditional { condition: Use, when_true: BranchTarget, when_false: BranchTarget },
    Return { value: Option<Use> },
}

impl InstructionKind {
    /// Whether this kind ends a basic block.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstructionKind::Branch { .. }
                | InstructionKind::Conditional { .. }
                | InstructionKind::Return { .. }
        )
    }

    /// Computes the result type of this instruction from its operand
    /// types, per the table in §4.2. Returns `None` if the operands are
    /// not well-typed for this kind (left for the verifier to report).
    ///
    /// Every operand is a [`Use`], which already carries its own ascribed
    /// type (invariant 3), so no separate lookup into the module's
    /// arenas is needed here.
    #[must_use]
    pub fn result_type(&self) -> Option<Type> {
        match self {
            InstructionKind::Binary { op, lhs, rhs, broadcasting } => {
                let result = lhs.ascribed_type().broadcast_result(rhs.ascribed_type(), *broadcasting)?;
                if op.is_comparison() {
                    let t = result.tensor()?;
                    Some(Type::tensor_of(t.shape.clone(), DataType::bool1()))
                } else {
                    Some(result)
                }
            }
            InstructionKind::Unary { operand, .. } => Some(operand.ascribed_type().clone()),
            InstructionKind::MatrixMultiply { lhs, rhs } => lhs.ascribed_type().matmul_result(rhs.ascribed_type()),
            InstructionKind::Transpose { operand } => {
                let t = operand.ascribed_type().tensor()?;
                if t.rank() < 2 {
                    return None;
                }
                let mut shape = t.shape.clone();
                let n = shape.len();
                shape.swap(n - 1, n - 2);
                Some(Type::tensor_of(shape, t.data_type))
            }
            InstructionKind::Reduce { operand, axis, .. } => {
                let t = operand.ascribed_type().tensor()?;
                if *axis >= t.rank() {
                    return None;
                }
                let mut shape = t.shape.clone();
                shape.remove(*axis);
                Some(Type::tensor_of(shape, t.data_type))
            }
            InstructionKind::Scan { operand, axis, .. } => {
                let t = operand.ascribed_type().tensor()?;
                if *axis >= t.rank() {
                    return None;
                }
                Some(operand.ascribed_type().clone())
            }
            InstructionKind::Concatenate { operands, axis } => {
                let first = operands.first()?.ascribed_type().tensor()?;
                if *axis >= first.rank() {
                    return None;
                }
                let mut total = 0u64;
                for use_ in operands {
                    let t = use_.ascribed_type().tensor()?;
                    if t.data_type != first.data_type || t.rank() != first.rank() {
                        return None;
                    }
                    total += t.shape[*axis];
                }
                let mut shape = first.shape.clone();
                shape[*axis] = total;
                Some(Type::tensor_of(shape, first.data_type))
            }
            InstructionKind::ShapeCast { operand, shape } => {
                let t = operand.ascribed_type().tensor()?;
                Some(Type::tensor_of(shape.clone(), t.data_type))
            }
            InstructionKind::DataTypeCast { operand, data_type } => {
                let t = operand.ascribed_type().tensor()?;
                Some(Type::tensor_of(t.shape.clone(), *data_type))
            }
            InstructionKind::Tuple { elements } => {
                Some(Type::Tuple(elements.iter().map(|e| e.ascribed_type().clone()).collect()))
            }
            InstructionKind::Extract { source, keys } => source.ascribed_type().element_type(keys),
            InstructionKind::Insert { destination, .. } => Some(destination.ascribed_type().clone()),
            InstructionKind::ElementPointer { source, keys } => {
                let pointee = source.ascribed_type().element_type(keys)?;
                Some(Type::Pointer(Box::new(pointee)))
            }
            InstructionKind::Load { pointer } => match pointer.ascribed_type() {
                Type::Pointer(inner) | Type::Box(inner) => Some((**inner).clone()),
                _ => None,
            },
            InstructionKind::Store { .. } => Some(Type::Void),
            InstructionKind::AllocateHeap { element_type, .. } => Some(Type::Array(Box::new(element_type.clone()))),
            InstructionKind::AllocateBox { element_type } => Some(Type::Box(Box::new(element_type.clone()))),
            InstructionKind::ProjectBox { boxed } => match boxed.ascribed_type() {
                Type::Box(inner) => Some((**inner).clone()),
                _ => None,
            },
            InstructionKind::Deallocate { .. } => Some(Type::Void),
            InstructionKind::Apply { callee, .. } => match callee.ascribed_type() {
                Type::Function(f) => Some((*f.result).clone()),
                _ => None,
            },
            InstructionKind::Gradient { function, with_respect_to, keeping, .. } => {
                let f = match function.ascribed_type() {
                    Type::Function(f) => f,
                    _ => return None,
                };
                let mut elements = Vec::new();
                if !keeping.is_empty() {
                    elements.push((*f.result).clone());
                }
                for &index in with_respect_to {
                    elements.push(f.arguments.get(index)?.clone());
                }
                Some(Type::Tuple(elements))
            }
            InstructionKind::Branch { .. } | InstructionKind::Conditional { .. } | InstructionKind::Return { .. } => {
                Some(Type::Void)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Literal, ScalarLiteral};

    fn scalar_use(t: Type, v: f64) -> Use {
        Use::Literal(t, Literal::Scalar(ScalarLiteral::Float(v)))
    }

    #[test]
    fn add_broadcasts_and_preserves_data_type() {
        let t = Type::tensor_of(vec![4, 4], DataType::f32());
        let kind = InstructionKind::Binary {
            op: BinaryOp::Add,
            lhs: scalar_use(t.clone(), 1.0),
            rhs: scalar_use(t.clone(), 2.0),
            broadcasting: None,
        };
        assert_eq!(kind.result_type(), Some(t));
    }

    #[test]
    fn comparison_yields_bool_tensor() {
        let t = Type::tensor_of(vec![4, 4], DataType::f32());
        let kind = InstructionKind::Binary {
            op: BinaryOp::LessThan,
            lhs: scalar_use(t.clone(), 1.0),
            rhs: scalar_use(t, 2.0),
            broadcasting: None,
        };
        assert_eq!(kind.result_type(), Some(Type::tensor_of(vec![4, 4], DataType::bool1())));
    }

    #[test]
    fn reduce_drops_the_axis() {
        let t = Type::tensor_of(vec![4, 8], DataType::f32());
        let kind = InstructionKind::Reduce { op: AssociativeOp::Sum, operand: scalar_use(t, 0.0), axis: 1 };
        assert_eq!(kind.result_type(), Some(Type::tensor_of(vec![4], DataType::f32())));
    }

    #[test]
    fn scan_preserves_shape() {
        let t = Type::tensor_of(vec![4, 8], DataType::f32());
        let kind = InstructionKind::Scan { op: AssociativeOp::Sum, operand: scalar_use(t.clone(), 0.0), axis: 1 };
        assert_eq!(kind.result_type(), Some(t));
    }

    #[test]
    fn store_and_deallocate_are_void() {
        let t = Type::scalar(DataType::f32());
        let store = InstructionKind::Store { value: scalar_use(t.clone(), 1.0), destination: scalar_use(t.clone(), 2.0) };
        assert_eq!(store.result_type(), Some(Type::Void));
        let dealloc = InstructionKind::Deallocate { value: scalar_use(t, 3.0) };
        assert_eq!(dealloc.result_type(), Some(Type::Void));
    }

    #[test]
    fn allocate_heap_yields_array_type() {
        let element = Type::scalar(DataType::f32());
        let count = scalar_use(Type::scalar(DataType::i32()), 4.0);
        let kind = InstructionKind::AllocateHeap { element_type: element.clone(), count };
        assert_eq!(kind.result_type(), Some(Type::Array(Box::new(element))));
    }

    #[test]
    fn gradient_tuples_wrt_argument_types_and_keeps_result() {
        let result_ty = Type::scalar(DataType::f32());
        let arg0 = Type::scalar(DataType::f32());
        let arg1 = Type::tensor_of(vec![4], DataType::f32());
        let function_type = Type::Function(crate::ty::FunctionType {
            arguments: vec![arg0.clone(), arg1.clone()],
            result: Box::new(result_ty.clone()),
        });
        let kind = InstructionKind::Gradient {
            function: scalar_use(function_type, 0.0),
            output: scalar_use(result_ty.clone(), 0.0),
            with_respect_to: vec![0, 1],
            keeping: vec![0],
        };
        assert_eq!(
            kind.result_type(),
            Some(Type::Tuple(vec![result_ty, arg0, arg1]))
        );
    }

    #[test]
    fn terminators_are_recognized() {
        assert!(InstructionKind::Return { value: None }.is_terminator());
        assert!(!InstructionKind::Deallocate { value: scalar_use(Type::scalar(DataType::f32()), 0.0) }.is_terminator());
    }
}
