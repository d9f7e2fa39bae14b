/// Defines the type of an entry in an element's equation list
///
/// ```text
/// lm ≥ 0   →  free equation number lm
/// lm = -1  →  excluded degree of freedom (no equation)
/// lm ≤ -2  →  prescribed degree of freedom owning equation J = -lm - 2
/// ```
///
/// The equation of a prescribed DOF is a valid index into the solution increment:
/// the model writes the prescribed increment there before the first iteration and the
/// corresponding row of the stiffness matrix becomes the identity.
pub type EqId = isize;

/// Equation id of an excluded degree of freedom
pub const EXCLUDED: EqId = -1;

/// Holds a decoded equation id
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Equation {
    /// Free equation
    Free(usize),

    /// Prescribed degree of freedom owning this equation
    Prescribed(usize),

    /// Excluded degree of freedom
    Excluded,
}

impl Equation {
    /// Decodes an equation id
    pub fn decode(lm: EqId) -> Self {
        if lm >= 0 {
            Equation::Free(lm as usize)
        } else if lm == EXCLUDED {
            Equation::Excluded
        } else {
            Equation::Prescribed((-lm - 2) as usize)
        }
    }

    /// Encodes this equation back into an equation id
    pub fn encode(&self) -> EqId {
        match self {
            Equation::Free(eq) => *eq as EqId,
            Equation::Prescribed(eq) => encode_prescribed(*eq),
            Equation::Excluded => EXCLUDED,
        }
    }

    /// Returns the index of the equation in the global system (None if excluded)
    pub fn index(&self) -> Option<usize> {
        match self {
            Equation::Free(eq) | Equation::Prescribed(eq) => Some(*eq),
            Equation::Excluded => None,
        }
    }
}

/// Returns the equation id of a prescribed degree of freedom owning the equation `eq`
#[inline]
pub fn encode_prescribed(eq: usize) -> EqId {
    -(eq as EqId) - 2
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{encode_prescribed, Equation, EXCLUDED};

    #[test]
    fn decode_works() {
        assert_eq!(Equation::decode(0), Equation::Free(0));
        assert_eq!(Equation::decode(7), Equation::Free(7));
        assert_eq!(Equation::decode(EXCLUDED), Equation::Excluded);
        assert_eq!(Equation::decode(-2), Equation::Prescribed(0));
        assert_eq!(Equation::decode(-5), Equation::Prescribed(3));
    }

    #[test]
    fn encode_and_index_work() {
        assert_eq!(encode_prescribed(3), -5);
        assert_eq!(Equation::Prescribed(3).encode(), -5);
        assert_eq!(Equation::Free(4).encode(), 4);
        assert_eq!(Equation::Excluded.encode(), -1);
        assert_eq!(Equation::Prescribed(3).index(), Some(3));
        assert_eq!(Equation::Free(4).index(), Some(4));
        assert_eq!(Equation::Excluded.index(), None);
    }
}
