pub mod whipple_builder;
