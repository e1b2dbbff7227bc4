pub mod broaden;
