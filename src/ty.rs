//! The type system: a closed sum of scalar, tensor and aggregate types.

use crate::arena::Id;
use crate::ir::{StructTypeData, TypeAliasData};

/// The base of a scalar data type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataTypeBase {
    Bool,
    Int,
    Float,
}

impl DataTypeBase {
    fn letter(self) -> char {
        match self {
            DataTypeBase::Bool => 'b',
            DataTypeBase::Int => 'i',
            DataTypeBase::Float => 'f',
        }
    }
}

/// A scalar data type: a base and a bit width, e.g. `f32`, `i64`, `b1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DataType {
    pub base: DataTypeBase,
    pub width: u32,
}

impl DataType {
    #[must_use] pub fn new(base: DataTypeBase, width: u32) -> Self { DataType { base, width } }
    #[must_use] pub fn bool1() -> Self { DataType::new(DataTypeBase::Bool, 1) }
    #[must_use] pub fn f32() -> Self { DataType::new(DataTypeBase::Float, 32) }
    #[must_use] pub fn i32() -> Self { DataType::new(DataTypeBase::Int, 32) }

    #[must_use]
    pub fn token(self) -> String {
        format!("{}{}", self.base.letter(), self.width)
    }
}

/// A tensor shape: a finite sequence of positive dimensions. The empty
/// sequence is the shape of a scalar.
pub type Shape = Vec<u64>;

/// A tensor type: a shape paired with an element data type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TensorType {
    pub shape: Shape,
    pub data_type: DataType,
}

impl TensorType {
    #[must_use] pub fn new(shape: Shape, data_type: DataType) -> Self {
        TensorType { shape, data_type }
    }

    #[must_use] pub fn scalar(data_type: DataType) -> Self {
        TensorType { shape: Vec::new(), data_type }
    }

    #[must_use] pub fn is_scalar(&self) -> bool { self.shape.is_empty() }

    #[must_use] pub fn rank(&self) -> usize { self.shape.len() }
}

/// Configuration gate for broadcasting in a binary instruction. Its mere
/// presence (`Some`) means "broadcast the operand shapes numpy-style";
/// its absence means the two operand shapes must already match exactly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BroadcastingConfig;

/// A step used by `extract`/`insert`/`elementPointer` to address into an
/// aggregate value: either a tuple field position or a tensor dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKey {
    TupleIndex(usize),
    TensorDim(usize),
}

/// The type of a function value (used by the `function` type variant and
/// to type `Use::Function`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub arguments: Vec<Type>,
    pub result: Box<Type>,
}

/// The closed sum of all IR types.
///
/// `Alias` and `Struct` carry arena IDs rather than inline data: two
/// aliases (or two structs) are equal only if they name the same table
/// entry, which is the nominal (identity) equality the data model
/// requires for these two variants. Every other variant compares
/// structurally.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Tensor(TensorType),
    Tuple(Vec<Type>),
    Array(Box<Type>),
    Alias(Id<TypeAliasData>),
    Struct(Id<StructTypeData>),
    Function(FunctionType),
    /// A pointer to a value of the given type, produced by `elementPointer`.
    Pointer(Box<Type>),
    /// A heap-boxed value of the given type, produced by `allocateBox`.
    Box(Box<Type>),
    /// Sentinel used only by the pretty-printer to render a type it could
    /// not otherwise compute (e.g. when printing a malformed, unverified
    /// IR fragment for diagnostics). Never produced by result-typing.
    Invalid,
}

impl Type {
    #[must_use] pub fn is_void(&self) -> bool { matches!(self, Type::Void) }

    #[must_use] pub fn is_tensor(&self) -> bool { matches!(self, Type::Tensor(_)) }

    #[must_use] pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Tensor(t) if t.is_scalar())
    }

    #[must_use] pub fn tensor(&self) -> Option<&TensorType> {
        match self {
            Type::Tensor(t) => Some(t),
            _ => None,
        }
    }

    #[must_use] pub fn scalar(data_type: DataType) -> Self {
        Type::Tensor(TensorType::scalar(data_type))
    }

    #[must_use] pub fn tensor_of(shape: Shape, data_type: DataType) -> Self {
        Type::Tensor(TensorType::new(shape, data_type))
    }

    /// Checks whether `self` and `other` can be paired element-wise,
    /// aligning trailing dimensions and allowing size-1 dimensions to
    /// expand. With `config` absent the two tensor types must already be
    /// identical.
    #[must_use]
    pub fn broadcast_compatible(&self, other: &Self, config: Option<BroadcastingConfig>) -> bool {
        self.broadcast_result(other, config).is_some()
    }

    /// Computes the broadcast result type of two tensor types, or `None`
    /// if they are incompatible.
    #[must_use]
    pub fn broadcast_result(&self, other: &Self, config: Option<BroadcastingConfig>) -> Option<Type> {
        let (a, b) = (self.tensor()?, other.tensor()?);
        if a.data_type != b.data_type {
            return None;
        }
        if config.is_none() {
            return if a.shape == b.shape { Some(self.clone()) } else { None };
        }
        let rank = a.rank().max(b.rank());
        let mut result = vec![0u64; rank];
        for i in 0..rank {
            let da = dim_from_end(&a.shape, i);
            let db = dim_from_end(&b.shape, i);
            let d = match (da, db) {
                (Some(x), Some(y)) if x == y => x,
                (Some(1), Some(y)) => y,
                (Some(x), Some(1)) => x,
                (Some(x), None) => x,
                (None, Some(y)) => y,
                _ => return None,
            };
            result[rank - 1 - i] = d;
        }
        Some(Type::tensor_of(result, a.data_type))
    }

    /// Types an `extract`/`insert`/`elementPointer` address: walks `keys`
    /// into `self`, returning the type found at the end of the path.
    #[must_use]
    pub fn element_type(&self, keys: &[ElementKey]) -> Option<Type> {
        let mut current = self.clone();
        for key in keys {
            current = match (key, &current) {
                (ElementKey::TupleIndex(i), Type::Tuple(elems)) => elems.get(*i)?.clone(),
                (ElementKey::TensorDim(dim), Type::Tensor(t)) => {
                    let mut shape = t.shape.clone();
                    if *dim >= shape.len() {
                        return None;
                    }
                    shape.remove(*dim);
                    Type::tensor_of(shape, t.data_type)
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Result type of `matrixMultiply(self, other)`: contracts the last
    /// dimension of `self` with the first dimension of `other`,
    /// broadcasting any remaining leading (batch) dimensions.
    #[must_use]
    pub fn matmul_result(&self, other: &Self) -> Option<Type> {
        let (a, b) = (self.tensor()?, other.tensor()?);
        if a.data_type != b.data_type || a.rank() < 2 || b.rank() < 2 {
            return None;
        }
        let contract_a = a.shape[a.rank() - 1];
        let contract_b = b.shape[b.rank() - 2];
        if contract_a != contract_b {
            return None;
        }
        let batch_a = &a.shape[..a.rank() - 2];
        let batch_b = &b.shape[..b.rank() - 2];
        let batch_rank = batch_a.len().max(batch_b.len());
        let mut batch = vec![0u64; batch_rank];
        for i in 0..batch_rank {
            let da = dim_from_end(batch_a, i);
            let db = dim_from_end(batch_b, i);
            let d = match (da, db) {
                (Some(x), Some(y)) if x == y => x,
                (Some(1), Some(y)) => y,
                (Some(x), Some(1)) => x,
                (Some(x), None) => x,
                (None, Some(y)) => y,
                _ => return None,
            };
            batch[batch_rank - 1 - i] = d;
        }
        let mut shape = batch;
        shape.push(a.shape[a.rank() - 2]);
        shape.push(b.shape[b.rank() - 1]);
        Some(Type::tensor_of(shape, a.data_type))
    }
}

fn dim_from_end(shape: &[u64], i: usize) -> Option<u64> {
    if i < shape.len() {
        Some(shape[shape.len() - 1 - i])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_has_no_dims() {
        let t = Type::scalar(DataType::f32());
        assert!(t.is_scalar());
        assert!(t.is_tensor());
        assert!(!t.is_void());
    }

    #[test]
    fn data_type_token() {
        assert_eq!(DataType::f32().token(), "f32");
        assert_eq!(DataType::i32().token(), "i32");
        assert_eq!(DataType::bool1().token(), "b1");
    }

    #[test]
    fn broadcast_without_config_requires_exact_match() {
        let a = Type::tensor_of(vec![4, 4], DataType::f32());
        let b = Type::tensor_of(vec![4, 1], DataType::f32());
        assert!(!a.broadcast_compatible(&b, None));
        assert!(a.broadcast_compatible(&a.clone(), None));
    }

    #[test]
    fn broadcast_expands_size_one_dims() {
        let a = Type::tensor_of(vec![4, 4], DataType::f32());
        let b = Type::tensor_of(vec![4, 1], DataType::f32());
        let result = a.broadcast_result(&b, Some(BroadcastingConfig)).unwrap();
        assert_eq!(result, Type::tensor_of(vec![4, 4], DataType::f32()));
    }

    #[test]
    fn broadcast_aligns_trailing_dims() {
        let a = Type::tensor_of(vec![8, 3, 4], DataType::f32());
        let b = Type::tensor_of(vec![4], DataType::f32());
        let result = a.broadcast_result(&b, Some(BroadcastingConfig)).unwrap();
        assert_eq!(result, Type::tensor_of(vec![8, 3, 4], DataType::f32()));
    }

    #[test]
    fn matmul_contracts_inner_dims() {
        let a = Type::tensor_of(vec![32, 16], DataType::f32());
        let b = Type::tensor_of(vec![16, 8], DataType::f32());
        let result = a.matmul_result(&b).unwrap();
        assert_eq!(result, Type::tensor_of(vec![32, 8], DataType::f32()));
    }

    #[test]
    fn matmul_broadcasts_batch_dims() {
        let a = Type::tensor_of(vec![5, 1, 3, 4], DataType::f32());
        let b = Type::tensor_of(vec![1, 7, 4, 2], DataType::f32());
        let result = a.matmul_result(&b).unwrap();
        assert_eq!(result, Type::tensor_of(vec![5, 7, 3, 2], DataType::f32()));
    }

    #[test]
    fn matmul_rejects_mismatched_contraction() {
        let a = Type::tensor_of(vec![3, 4], DataType::f32());
        let b = Type::tensor_of(vec![5, 2], DataType::f32());
        assert!(a.matmul_result(&b).is_none());
    }

    #[test]
    fn element_type_indexes_tuple_then_tensor() {
        let tuple = Type::Tuple(vec![
            Type::tensor_of(vec![4, 4], DataType::f32()),
            Type::scalar(DataType::i32()),
        ]);
        let at0 = tuple.element_type(&[ElementKey::TupleIndex(0)]).unwrap();
        assert_eq!(at0, Type::tensor_of(vec![4, 4], DataType::f32()));
        let at0_dim0 = tuple
            .element_type(&[ElementKey::TupleIndex(0), ElementKey::TensorDim(0)])
            .unwrap();
        assert_eq!(at0_dim0, Type::tensor_of(vec![4], DataType::f32()));
    }
}
