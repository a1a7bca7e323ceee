pub mod ai;
pub mod combat;
pub mod economy;
pub mod modifiers;
