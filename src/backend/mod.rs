pub mod rwfc;
