mod sensor_tests;
mod template_tests;
mod wol_tests;
