//! f32 helpers that resolve to the standard library intrinsics on hosted
//! builds and to `libm` on `no_std` targets.

#![allow(dead_code)]

#[cfg(feature = "std")]
mod imp {
    #[inline(always)]
    pub fn sqrtf(x: f32) -> f32 {
        x.sqrt()
    }

    #[inline(always)]
    pub fn fabsf(x: f32) -> f32 {
        x.abs()
    }

    #[inline(always)]
    pub fn floorf(x: f32) -> f32 {
        x.floor()
    }

    #[inline(always)]
    pub fn ceilf(x: f32) -> f32 {
        x.ceil()
    }

    #[inline(always)]
    pub fn roundf(x: f32) -> f32 {
        x.round()
    }

    #[inline(always)]
    pub fn cosf(x: f32) -> f32 {
        x.cos()
    }

    #[inline(always)]
    pub fn atan2f(y: f32, x: f32) -> f32 {
        y.atan2(x)
    }

    #[inline(always)]
    pub fn fminf(a: f32, b: f32) -> f32 {
        a.min(b)
    }

    #[inline(always)]
    pub fn fmaxf(a: f32, b: f32) -> f32 {
        a.max(b)
    }
}

#[cfg(not(feature = "std"))]
mod imp {
    pub use libm::{atan2f, ceilf, cosf, fabsf, floorf, fmaxf, fminf, roundf, sqrtf};
}

pub use imp::*;
