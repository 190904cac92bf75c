// This file is the module declaration file for the `core` module.
//
// `config` module:
// The live `Config` modes are activated into, the TOML-backed `ModeSettings`
// it is created from, and the `ConfigProvider` trait with its
// `SettingsManager` implementation for loading and saving those settings.
pub mod config;

// `engine` module:
// The `ModeNotifier` hook that ties a configuration to the registry cache:
// it rebuilds registries after search path changes and resolves mode names
// on activation.
pub mod engine;

// `error` module:
// The `ModeError` type shared by every part of the crate.
pub mod error;
