mod helpers;

mod append_tests;
