//! Test Helper Utilities
//!
//! Shared utilities for testing pantry-catalog

#![allow(dead_code)]

pub mod db_utils;
pub mod fakes;

pub use db_utils::{count_rows, insert_item, link_recipe, test_pool};
pub use fakes::{
    ingredient_info, FailingEnqueueQueue, FailingRemoveQueue, FakeLease, FakeNutritionProvider, FakeRecipeProvider,
    FlakyCatalog,
};
