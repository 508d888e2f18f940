//! Профили кораблей — data-driven конфигурация здоровья/массы
//!
//! JSON реестр: имя класса → ShipStats. Хост может подгрузить свой
//! набор через load_json; незнакомое имя деградирует в corvette
//! с warning, не ошибкой.

use std::collections::HashMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::combat::health::LayeredHealth;
use crate::logger;

/// Статы класса корабля (сериализуемый профиль)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipStats {
    pub max_shield: f32,
    pub max_armor: f32,
    pub max_hull: f32,
    pub shield_regen_rate: f32,
    pub shield_regen_delay: f32,
    pub shield_physical_intake: f32,
    pub armor_damage_intake: f32,
    pub hull_energy_intake: f32,
    pub mass: f32,
    pub collision_radius: f32,
}

impl Default for ShipStats {
    fn default() -> Self {
        Self::corvette()
    }
}

impl ShipStats {
    /// Лёгкий перехватчик: тонкая обшивка, быстрый щит
    pub fn interceptor() -> Self {
        Self {
            max_shield: 60.0,
            max_armor: 20.0,
            max_hull: 80.0,
            shield_regen_rate: 20.0,
            shield_regen_delay: 2.0,
            shield_physical_intake: 0.8,
            armor_damage_intake: 0.6,
            hull_energy_intake: 1.0,
            mass: 40.0,
            collision_radius: 1.5,
        }
    }

    /// Корвет: сбалансированная рабочая лошадка
    pub fn corvette() -> Self {
        Self {
            max_shield: 100.0,
            max_armor: 60.0,
            max_hull: 150.0,
            shield_regen_rate: 10.0,
            shield_regen_delay: 3.0,
            shield_physical_intake: 1.0,
            armor_damage_intake: 0.5,
            hull_energy_intake: 1.0,
            mass: 100.0,
            collision_radius: 2.5,
        }
    }

    /// Грузовик: толстая броня, слабый щит
    pub fn freighter() -> Self {
        Self {
            max_shield: 50.0,
            max_armor: 200.0,
            max_hull: 400.0,
            shield_regen_rate: 5.0,
            shield_regen_delay: 5.0,
            shield_physical_intake: 1.0,
            armor_damage_intake: 0.35,
            hull_energy_intake: 0.8,
            mass: 500.0,
            collision_radius: 6.0,
        }
    }
}

/// Реестр профилей по имени класса
#[derive(Resource, Debug, Clone)]
pub struct ShipStatsRegistry {
    profiles: HashMap<String, ShipStats>,
}

impl Default for ShipStatsRegistry {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert("interceptor".to_string(), ShipStats::interceptor());
        profiles.insert("corvette".to_string(), ShipStats::corvette());
        profiles.insert("freighter".to_string(), ShipStats::freighter());
        Self { profiles }
    }
}

impl ShipStatsRegistry {
    /// Загрузка реестра из JSON: { "имя": { ...stats } }
    pub fn load_json(json: &str) -> Result<Self, serde_json::Error> {
        let profiles: HashMap<String, ShipStats> = serde_json::from_str(json)?;
        Ok(Self { profiles })
    }

    /// Дозагрузка/переопределение профилей поверх существующих
    pub fn merge_json(&mut self, json: &str) -> Result<(), serde_json::Error> {
        let profiles: HashMap<String, ShipStats> = serde_json::from_str(json)?;
        self.profiles.extend(profiles);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ShipStats> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(|s| s.as_str())
    }

    /// Здоровье для класса; незнакомое имя → corvette с warning
    pub fn health_for(&self, name: &str) -> LayeredHealth {
        match self.profiles.get(name) {
            Some(stats) => LayeredHealth::from_stats(stats),
            None => {
                logger::log_warning(&format!(
                    "Unknown ship class '{}', falling back to corvette",
                    name
                ));
                LayeredHealth::from_stats(&ShipStats::corvette())
            }
        }
    }
}
