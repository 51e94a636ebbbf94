//! Static types of expression nodes.

use std::fmt;

/// Distance charged for boxing any value into `object`.
pub const OBJECT_DISTANCE: u32 = 10;

/// The static type of an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    /// Type of the bare `null` literal before it is converted to a target type.
    Null,
    Object,
    Bool,
    Char,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Decimal,
    String,
    Nullable(Box<Type>),
    Array {
        element: Box<Type>,
        rank: usize,
    },
    /// A class registered in the type universe, by full name, with its generic arguments.
    Named {
        name: String,
        args: Vec<Type>,
    },
    Function {
        params: Vec<Type>,
        ret: Box<Type>,
    },
    /// Generic parameter of the declaring type, only found in member signatures.
    TypeParam(usize),
    /// Generic parameter of a generic method, only found in method signatures.
    MethodParam(usize),
}

impl Type {
    pub fn named(name: impl Into<String>) -> Type {
        Type::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<Type>) -> Type {
        Type::Named {
            name: name.into(),
            args,
        }
    }

    pub fn array(element: Type, rank: usize) -> Type {
        Type::Array {
            element: Box::new(element),
            rank: rank.max(1),
        }
    }

    pub fn function(params: Vec<Type>, ret: Type) -> Type {
        Type::Function {
            params,
            ret: Box::new(ret),
        }
    }

    /// Wrap a value type in `Nullable`. Types that already accept null are returned unchanged.
    pub fn nullable(self) -> Type {
        if self.is_value_type() {
            Type::Nullable(Box::new(self))
        } else {
            self
        }
    }

    /// The type without its `Nullable` wrapper.
    pub fn underlying(&self) -> &Type {
        match self {
            Type::Nullable(inner) => inner,
            other => other,
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Nullable(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Type::Byte
                | Type::Short
                | Type::Int
                | Type::Long
                | Type::Float
                | Type::Double
                | Type::Decimal
        )
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, Type::Byte | Type::Short | Type::Int | Type::Long)
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, Type::Float | Type::Double)
    }

    /// Whether values of this type are stored inline and can never be null.
    pub fn is_value_type(&self) -> bool {
        matches!(self, Type::Bool | Type::Char) || self.is_numeric()
    }

    /// Whether `null` is a legal value of this type.
    pub fn accepts_null(&self) -> bool {
        !self.is_value_type() && !matches!(self, Type::Void)
    }

    /// Generic arguments carried by this type, used to instantiate member signatures.
    pub fn type_arguments(&self) -> Vec<Type> {
        match self {
            Type::Named { args, .. } => args.clone(),
            Type::Nullable(inner) => vec![inner.as_ref().clone()],
            Type::Array { element, .. } => vec![element.as_ref().clone()],
            _ => Vec::new(),
        }
    }

    /// Replace generic placeholders with concrete arguments.
    ///
    /// Placeholders without a matching argument are left in place.
    pub fn substitute(&self, class_args: &[Type], method_args: &[Type]) -> Type {
        match self {
            Type::TypeParam(idx) => class_args.get(*idx).cloned().unwrap_or_else(|| self.clone()),
            Type::MethodParam(idx) => method_args
                .get(*idx)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            Type::Nullable(inner) => {
                let inner = inner.substitute(class_args, method_args);
                // `Nullable<string>` collapses to `string`.
                inner.nullable()
            }
            Type::Array { element, rank } => {
                Type::array(element.substitute(class_args, method_args), *rank)
            }
            Type::Named { name, args } => Type::Named {
                name: name.clone(),
                args: args
                    .iter()
                    .map(|arg| arg.substitute(class_args, method_args))
                    .collect(),
            },
            Type::Function { params, ret } => Type::Function {
                params: params
                    .iter()
                    .map(|param| param.substitute(class_args, method_args))
                    .collect(),
                ret: Box::new(ret.substitute(class_args, method_args)),
            },
            other => other.clone(),
        }
    }

    /// Whether the type still mentions a generic method parameter.
    pub fn has_method_params(&self) -> bool {
        match self {
            Type::MethodParam(_) => true,
            Type::Nullable(inner) => inner.has_method_params(),
            Type::Array { element, .. } => element.has_method_params(),
            Type::Named { args, .. } => args.iter().any(Type::has_method_params),
            Type::Function { params, ret } => {
                params.iter().any(Type::has_method_params) || ret.has_method_params()
            }
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Null => write!(f, "null"),
            Type::Object => write!(f, "object"),
            Type::Bool => write!(f, "bool"),
            Type::Char => write!(f, "char"),
            Type::Byte => write!(f, "byte"),
            Type::Short => write!(f, "short"),
            Type::Int => write!(f, "int"),
            Type::Long => write!(f, "long"),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Decimal => write!(f, "decimal"),
            Type::String => write!(f, "string"),
            Type::Nullable(inner) => write!(f, "{inner}?"),
            Type::Array { element, rank } => {
                write!(f, "{element}[{}]", ",".repeat(rank.saturating_sub(1)))
            }
            Type::Named { name, args } => {
                let short = name.rsplit('.').next().unwrap_or(name);
                write!(f, "{short}")?;
                if !args.is_empty() {
                    let rendered: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
                    write!(f, "<{}>", rendered.join(", "))?;
                }
                Ok(())
            }
            Type::Function { params, ret } => {
                let mut rendered: Vec<String> = params.iter().map(|arg| arg.to_string()).collect();
                rendered.push(ret.to_string());
                write!(f, "Func<{}>", rendered.join(", "))
            }
            Type::TypeParam(idx) => write!(f, "T{idx}"),
            Type::MethodParam(idx) => write!(f, "M{idx}"),
        }
    }
}

/// Widening ranks of the numeric types.
///
/// A lower-ranked operand is widened to the higher rank before a binary operator is built, and
/// the rank difference is the cost of an implicit numeric conversion during overload selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericRanks {
    ranks: Vec<(Type, u8)>,
}

impl Default for NumericRanks {
    fn default() -> Self {
        Self {
            ranks: vec![
                (Type::Byte, 1),
                (Type::Short, 2),
                (Type::Int, 3),
                (Type::Long, 4),
                (Type::Float, 5),
                (Type::Double, 6),
                (Type::Decimal, 7),
            ],
        }
    }
}

impl NumericRanks {
    pub fn rank(&self, ty: &Type) -> Option<u8> {
        self.ranks
            .iter()
            .find(|(candidate, _)| candidate == ty)
            .map(|(_, rank)| *rank)
    }

    /// Cost of implicitly widening `from` to `to`, if the conversion exists.
    pub fn widening(&self, from: &Type, to: &Type) -> Option<u32> {
        if from.is_floating() && *to == Type::Decimal {
            return None;
        }
        let from_rank = self.rank(from)?;
        let to_rank = self.rank(to)?;
        (to_rank >= from_rank).then(|| u32::from(to_rank - from_rank))
    }

    /// The common type two numeric operands are promoted to.
    ///
    /// Arithmetic never happens below `int`, matching C#'s treatment of `byte` and `short`.
    pub fn promote(&self, left: &Type, right: &Type) -> Option<Type> {
        let left_rank = self.rank(left)?;
        let right_rank = self.rank(right)?;
        if (left.is_floating() && *right == Type::Decimal)
            || (right.is_floating() && *left == Type::Decimal)
        {
            return None;
        }
        let winner = if left_rank >= right_rank { left } else { right };
        match self.rank(&Type::Int) {
            Some(int_rank) if self.rank(winner)? < int_rank => Some(Type::Int),
            _ => Some(winner.clone()),
        }
    }
}

/// Cost of implicitly converting a value of type `from` to type `to`.
///
/// `Some(0)` is an exact match, larger numbers are worse matches and `None` means the conversion
/// does not exist.
pub fn conversion_distance(from: &Type, to: &Type, ranks: &NumericRanks) -> Option<u32> {
    if from == to {
        return Some(0);
    }
    match (from, to) {
        (Type::Void, _) | (_, Type::Void) => None,
        (Type::Null, target) => target.accepts_null().then_some(1),
        (_, Type::Object) => Some(OBJECT_DISTANCE),
        (Type::Nullable(inner_from), Type::Nullable(inner_to)) => {
            conversion_distance(inner_from, inner_to, ranks)
        }
        (Type::Nullable(_), _) => None,
        (source, Type::Nullable(inner_to)) => {
            conversion_distance(source, inner_to, ranks).map(|distance| distance + 1)
        }
        (source, target) if source.is_numeric() && target.is_numeric() => {
            ranks.widening(source, target)
        }
        _ => None,
    }
}

/// Whether an explicit cast `(to)expr` is allowed from `from`.
pub fn is_explicitly_convertible(from: &Type, to: &Type, ranks: &NumericRanks) -> bool {
    if conversion_distance(from, to, ranks).is_some() {
        return true;
    }
    let from = from.underlying();
    let to_inner = to.underlying();
    match (from, to_inner) {
        (Type::Object, _) | (_, Type::Object) => true,
        (a, b) if (a.is_numeric() || *a == Type::Char) && (b.is_numeric() || *b == Type::Char) => {
            true
        }
        (a, b) => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances_follow_widening_ranks() {
        let ranks = NumericRanks::default();
        assert_eq!(conversion_distance(&Type::Int, &Type::Int, &ranks), Some(0));
        assert_eq!(conversion_distance(&Type::Int, &Type::Long, &ranks), Some(1));
        assert_eq!(conversion_distance(&Type::Int, &Type::Double, &ranks), Some(3));
        assert_eq!(conversion_distance(&Type::Double, &Type::Int, &ranks), None);
        assert_eq!(conversion_distance(&Type::Double, &Type::Decimal, &ranks), None);
        assert_eq!(
            conversion_distance(&Type::Int, &Type::Object, &ranks),
            Some(OBJECT_DISTANCE)
        );
    }

    #[test]
    fn nullable_and_null_conversions() {
        let ranks = NumericRanks::default();
        let nullable_int = Type::Int.nullable();
        assert_eq!(conversion_distance(&Type::Int, &nullable_int, &ranks), Some(1));
        assert_eq!(conversion_distance(&nullable_int, &Type::Int, &ranks), None);
        assert_eq!(conversion_distance(&Type::Null, &nullable_int, &ranks), Some(1));
        assert_eq!(conversion_distance(&Type::Null, &Type::String, &ranks), Some(1));
        assert_eq!(conversion_distance(&Type::Null, &Type::Int, &ranks), None);
    }

    #[test]
    fn promotion_never_goes_below_int() {
        let ranks = NumericRanks::default();
        assert_eq!(ranks.promote(&Type::Byte, &Type::Short), Some(Type::Int));
        assert_eq!(ranks.promote(&Type::Int, &Type::Double), Some(Type::Double));
        assert_eq!(ranks.promote(&Type::Long, &Type::Float), Some(Type::Float));
        assert_eq!(ranks.promote(&Type::Double, &Type::Decimal), None);
    }

    #[test]
    fn substitute_collapses_nullable_reference_types() {
        let nullable = Type::Nullable(Box::new(Type::TypeParam(0)));
        assert_eq!(
            nullable.substitute(&[Type::Int], &[]),
            Type::Nullable(Box::new(Type::Int))
        );
        assert_eq!(nullable.substitute(&[Type::String], &[]), Type::String);
    }

    #[test]
    fn display_uses_csharp_names() {
        assert_eq!(Type::array(Type::Int, 2).to_string(), "int[,]");
        assert_eq!(Type::Double.nullable().to_string(), "double?");
        assert_eq!(
            Type::generic("System.Collections.Generic.List", vec![Type::Int]).to_string(),
            "List<int>"
        );
    }
}
