pub mod bitcointrade;
