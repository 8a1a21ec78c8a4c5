//! Primitive value types for the public VM simulator.
//!
//! All data that crosses the public VM boundary (calldata, storage slots,
//! nullifiers, note hashes, fee parameters) is carried as elements of a
//! fixed prime field ([`Scalar`]). Contract addresses and function selectors
//! are thin wrappers with their own encodings into that field. The hashing
//! helpers at the bottom of this crate define the two protocol-fixed hashing
//! schemes the execution core relies on: the var-args hash binding an
//! argument sequence into a single scalar, and the per-contract siloing of
//! nullifier values.

use std::fmt::{self, Debug, Display, LowerHex};
use std::ops::{Add, AddAssign};

use ethereum_types::U256;
use keccak_hash::keccak;
use serde::{Deserialize, Serialize};

/// The scalar field modulus of the BN254 curve.
/// 0x30644e72e131a029b85045b68181585d2833e84879b9709143e1f593f0000001
pub const SCALAR_MODULUS: U256 = U256([
    0x43e1f593f0000001,
    0x2833e84879b97091,
    0xb85045b68181585d,
    0x30644e72e131a029,
]);

/// An element of the BN254 scalar field, the native value type for all
/// on-chain and in-circuit data.
///
/// Construction always reduces modulo [`SCALAR_MODULUS`], so a `Scalar` is
/// canonical by construction. Only the operations the execution core needs
/// are provided; this is not a general field-arithmetic library.
#[derive(
    Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct Scalar(U256);

impl Scalar {
    /// The additive identity.
    pub const ZERO: Scalar = Scalar(U256([0, 0, 0, 0]));
    /// The multiplicative identity.
    pub const ONE: Scalar = Scalar(U256([1, 0, 0, 0]));

    /// Creates a scalar from an arbitrary `U256`, reducing it into the field.
    pub fn new(value: U256) -> Self {
        Self(value % SCALAR_MODULUS)
    }

    /// Creates a scalar from a small integer. Usable in const contexts;
    /// every `u64` is already canonical.
    pub const fn from_u64(value: u64) -> Self {
        Self(U256([value, 0, 0, 0]))
    }

    /// Creates a scalar from a 32-byte big-endian encoding, reducing it into
    /// the field.
    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Self::new(U256::from_big_endian(&bytes))
    }

    /// Returns the canonical 32-byte big-endian encoding.
    pub fn to_be_bytes(self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        self.0.to_big_endian(&mut bytes);
        bytes
    }

    /// Returns the underlying canonical representative.
    pub const fn as_u256(self) -> U256 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

impl From<u64> for Scalar {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        if value {
            Self::ONE
        } else {
            Self::ZERO
        }
    }
}

impl From<U256> for Scalar {
    fn from(value: U256) -> Self {
        Self::new(value)
    }
}

impl Add for Scalar {
    type Output = Scalar;

    // Both operands are canonical, so the raw sum fits in 255 bits and a
    // single reduction suffices.
    fn add(self, rhs: Scalar) -> Scalar {
        Scalar((self.0 + rhs.0) % SCALAR_MODULUS)
    }
}

impl AddAssign for Scalar {
    fn add_assign(&mut self, rhs: Scalar) {
        *self = *self + rhs;
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// Derived `Debug` would print raw limbs; route through `Display` instead.
impl Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl LowerHex for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        LowerHex::fmt(&self.0, f)
    }
}

/// The address of a deployed contract instance.
#[derive(
    Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct ContractAddress(Scalar);

impl ContractAddress {
    pub const fn new(value: Scalar) -> Self {
        Self(value)
    }

    /// Returns the address as a field element, the form in which it enters
    /// hashes and calldata.
    pub const fn to_scalar(self) -> Scalar {
        self.0
    }
}

impl From<u64> for ContractAddress {
    fn from(value: u64) -> Self {
        Self(Scalar::from(value))
    }
}

impl Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Debug for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// A fixed-width identifier derived from a function's signature, used to
/// dispatch public calls.
#[derive(
    Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct FunctionSelector(u32);

impl FunctionSelector {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// The empty selector, used where a call site carries no dispatch
    /// information of its own.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Derives the selector for a canonical function signature string, e.g.
    /// `"transfer(Field,Field)"`, as the first four bytes of its keccak
    /// digest.
    pub fn from_signature(signature: &str) -> Self {
        let digest = keccak(signature.as_bytes());
        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&digest.as_bytes()[..4]);
        Self(u32::from_be_bytes(prefix))
    }

    /// Returns the selector widened to a field element, the form in which it
    /// is bound into calldata.
    pub fn to_scalar(self) -> Scalar {
        Scalar::from(self.0 as u64)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl Display for FunctionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl Debug for FunctionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Hashes an ordered argument sequence into a single scalar.
///
/// The scheme is fixed by the protocol and independent of the call frame it
/// is computed in: the keccak digest of the concatenated 32-byte big-endian
/// argument encodings, reduced into the field.
pub fn compute_var_args_hash(args: &[Scalar]) -> Scalar {
    let mut bytes = Vec::with_capacity(args.len() * 32);
    for arg in args {
        bytes.extend_from_slice(&arg.to_be_bytes());
    }
    Scalar::from_be_bytes(keccak(&bytes).to_fixed_bytes())
}

/// Scopes a nullifier value to the contract that emitted it, preventing
/// cross-contract collisions.
pub fn silo_nullifier(contract: ContractAddress, nullifier: Scalar) -> Scalar {
    compute_var_args_hash(&[contract.to_scalar(), nullifier])
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn scalar_modulus_matches_reference_encoding() {
        let reference = U256::from_big_endian(&hex!(
            "30644e72e131a029b85045b68181585d2833e84879b9709143e1f593f0000001"
        ));
        assert_eq!(SCALAR_MODULUS, reference);
    }

    #[test]
    fn scalar_construction_reduces() {
        assert_eq!(Scalar::new(SCALAR_MODULUS), Scalar::ZERO);
        assert_eq!(Scalar::new(SCALAR_MODULUS + 1), Scalar::ONE);
        assert_eq!(Scalar::from(7u64).as_u256(), U256::from(7));
    }

    #[test]
    fn scalar_addition_wraps_at_the_modulus() {
        let almost = Scalar::new(SCALAR_MODULUS - 1);
        assert_eq!(almost + Scalar::ONE, Scalar::ZERO);
        assert_eq!(Scalar::ONE + Scalar::ONE, Scalar::from(2u64));
    }

    #[test]
    fn scalar_byte_round_trip_is_canonical() {
        let value = Scalar::from(0xdead_beefu64);
        assert_eq!(Scalar::from_be_bytes(value.to_be_bytes()), value);
    }

    #[test]
    fn var_args_hash_is_order_sensitive() {
        let a = Scalar::from(1u64);
        let b = Scalar::from(2u64);
        assert_ne!(
            compute_var_args_hash(&[a, b]),
            compute_var_args_hash(&[b, a])
        );
        assert_ne!(compute_var_args_hash(&[a]), compute_var_args_hash(&[a, a]));
    }

    #[test]
    fn var_args_hash_lands_in_the_field() {
        let digest = compute_var_args_hash(&[Scalar::from(42u64)]);
        assert!(digest.as_u256() < SCALAR_MODULUS);
    }

    #[test]
    fn siloing_separates_contracts() {
        let nullifier = Scalar::from(99u64);
        let siloed_a = silo_nullifier(ContractAddress::from(1), nullifier);
        let siloed_b = silo_nullifier(ContractAddress::from(2), nullifier);
        assert_ne!(siloed_a, siloed_b);
        assert_ne!(siloed_a, nullifier);
    }

    #[test]
    fn selector_from_signature_takes_the_digest_prefix() {
        let selector = FunctionSelector::from_signature("transfer(Field,Field)");
        let digest = keccak("transfer(Field,Field)".as_bytes());
        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&digest.as_bytes()[..4]);
        assert_eq!(selector.as_u32(), u32::from_be_bytes(prefix));
        assert_ne!(selector, FunctionSelector::from_signature("transfer(Field)"));
    }

    #[test]
    fn display_formats_are_hex() {
        assert_eq!(Scalar::from(255u64).to_string(), "0xff");
        assert_eq!(FunctionSelector::new(0x1234).to_string(), "0x00001234");
    }
}
