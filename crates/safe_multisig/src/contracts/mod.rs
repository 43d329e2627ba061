pub mod safe;

pub use self::safe::Safe;
