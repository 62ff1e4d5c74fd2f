pub mod mock_gpio;
