//! Money flows: passive income, fruit rolls and the weapon shop.

use hashbrown::HashMap;
use rand::Rng;

use crate::game::catalog::{roll_fruit, weapon_price};
use crate::game::constants::economy::{FRUIT_ROLL_COST, PASSIVE_INCOME};
use crate::game::state::{Player, PlayerId, WorldEvent};

/// Why a purchase did not go through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseError {
    NotForSale,
    AlreadyOwned,
    InsufficientFunds,
}

impl PurchaseError {
    pub fn message(self) -> &'static str {
        match self {
            PurchaseError::NotForSale => "That item is not for sale",
            PurchaseError::AlreadyOwned => "You already own that",
            PurchaseError::InsufficientFunds => "Not enough money!",
        }
    }
}

/// Credit passive income to every player. Returns the amount each received.
pub fn credit_income(players: &mut HashMap<PlayerId, Player>, event: WorldEvent) -> u64 {
    let amount = PASSIVE_INCOME * event.income_multiplier();
    for player in players.values_mut() {
        player.money += amount;
    }
    amount
}

/// Spend the roll cost and add a random fruit to the inventory
pub fn roll<R: Rng + ?Sized>(
    player: &mut Player,
    event: WorldEvent,
    rng: &mut R,
) -> Result<&'static str, PurchaseError> {
    if !player.try_spend(FRUIT_ROLL_COST) {
        return Err(PurchaseError::InsufficientFunds);
    }
    let fruit = roll_fruit(rng, player.luck * event.luck_multiplier());
    player.inventory.push(fruit);
    Ok(fruit)
}

/// Buy a shop weapon
pub fn buy_weapon(player: &mut Player, item: &str) -> Result<(), PurchaseError> {
    let price = weapon_price(item).ok_or(PurchaseError::NotForSale)?;
    if player.inventory.contains(item) {
        return Err(PurchaseError::AlreadyOwned);
    }
    if !player.try_spend(price) {
        return Err(PurchaseError::InsufficientFunds);
    }
    player.inventory.push(item);
    Ok(())
}
