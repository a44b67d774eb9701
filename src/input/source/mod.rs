pub mod guncon2;

#[cfg(test)]
pub mod guncon2_test;
