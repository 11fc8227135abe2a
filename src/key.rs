/// Fixed-width integer key accepted by the builder.
///
/// Keys are widened to a 64-bit word before hashing. Signed keys are
/// sign-extended and reinterpreted, which keeps the mapping injective for
/// every implementing type.
pub trait MphKey: Copy + Send + Sync {
    fn to_word(self) -> u64;
}

macro_rules! impl_unsigned {
    ($($t:ty),*) => {$(
        impl MphKey for $t {
            #[inline]
            fn to_word(self) -> u64 {
                self as u64
            }
        }
    )*};
}

macro_rules! impl_signed {
    ($($t:ty),*) => {$(
        impl MphKey for $t {
            #[inline]
            fn to_word(self) -> u64 {
                self as i64 as u64
            }
        }
    )*};
}

impl_unsigned!(u8, u16, u32, u64, usize);
impl_signed!(i8, i16, i32, i64, isize);
