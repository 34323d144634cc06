mod common;

mod api_tests;
mod renderer_tests;
