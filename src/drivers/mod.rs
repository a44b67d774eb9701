pub mod guncon2;
