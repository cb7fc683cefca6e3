pub mod comps;
pub mod dcf;
pub mod wacc;
