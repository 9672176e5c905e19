//! Requirement aggregation: order lines → total ingredient consumption.
//!
//! Pure read-and-compute. For every order item the menu item's recipe is
//! resolved, each recipe line is checked against the ingredient snapshot, and
//! `recipe quantity × portions` is converted to the base unit of its group and
//! summed per ingredient. An ingredient used by several items (or several
//! recipes) ends up with one combined requirement.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use rust_decimal::Decimal;

use larder_core::unit::{assert_compatible, from_base, to_base};
use larder_core::{IngredientId, MeasurementUnit, Quantity};
use larder_menu::{MenuItem, Recipe, RecipeCatalog};
use larder_sales::{Order, OrderItem};

use crate::deduction::DeductionOptions;
use crate::error::InventoryError;
use crate::ingredient::Ingredient;

/// Total consumption of one ingredient for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub ingredient_id: IngredientId,
    pub ingredient: String,
    /// Sum over all order items, in the base unit of the ingredient's group.
    pub required_base: Decimal,
    pub stock_unit: MeasurementUnit,
}

impl Requirement {
    pub fn base_unit(&self) -> MeasurementUnit {
        self.stock_unit.base_unit()
    }

    /// The requirement expressed in the ingredient's stocking unit.
    pub fn in_stock_unit(&self) -> Quantity {
        Quantity::new(from_base(self.required_base, self.stock_unit), self.stock_unit)
    }
}

/// Aggregated requirements of an order, keyed (and iterated) by ingredient id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    entries: BTreeMap<IngredientId, Requirement>,
}

impl Requirements {
    pub fn get(&self, ingredient_id: &IngredientId) -> Option<&Requirement> {
        self.entries.get(ingredient_id)
    }

    /// Requirements in ascending ingredient id order, so storage rows are
    /// always touched in the same order.
    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn add(&mut self, ingredient: &Ingredient, required_base: Decimal) -> Result<(), InventoryError> {
        match self.entries.entry(ingredient.id_typed()) {
            Entry::Occupied(mut entry) => {
                let req = entry.get_mut();
                req.required_base = req
                    .required_base
                    .checked_add(required_base)
                    .ok_or_else(|| too_large(ingredient.name()))?;
            }
            Entry::Vacant(entry) => {
                entry.insert(Requirement {
                    ingredient_id: ingredient.id_typed(),
                    ingredient: ingredient.name().to_string(),
                    required_base,
                    stock_unit: ingredient.unit(),
                });
            }
        }
        Ok(())
    }
}

fn too_large(ingredient: &str) -> InventoryError {
    InventoryError::InvalidQuantity(format!(
        "requirement for '{ingredient}' exceeds the representable range"
    ))
}

fn missing_recipe(item: &OrderItem, menu_item: Option<&MenuItem>) -> InventoryError {
    InventoryError::MissingRecipe {
        menu_item_id: item.menu_item_id,
        menu_item: menu_item
            .map(|m| m.name().to_string())
            .unwrap_or_else(|| item.menu_item_id.to_string()),
    }
}

/// Resolve the recipe behind an order item.
///
/// `Ok(None)` only when the recipe is empty and empty recipes are allowed.
fn resolve_recipe<'a, C>(
    catalog: &'a C,
    item: &OrderItem,
    options: &DeductionOptions,
) -> Result<Option<(&'a MenuItem, &'a Recipe)>, InventoryError>
where
    C: RecipeCatalog + ?Sized,
{
    let menu_item = catalog
        .menu_item(&item.menu_item_id)
        .ok_or_else(|| missing_recipe(item, None))?;
    let recipe = menu_item
        .recipe()
        .ok_or_else(|| missing_recipe(item, Some(menu_item)))?;

    if recipe.is_empty() {
        if options.allow_empty_recipes {
            return Ok(None);
        }
        return Err(missing_recipe(item, Some(menu_item)));
    }

    Ok(Some((menu_item, recipe)))
}

/// Ids of every ingredient the order's recipes reference, sorted and deduplicated.
///
/// Fails with `MissingRecipe` exactly where [`aggregate_requirements`] would.
pub fn referenced_ingredients<C>(
    order: &Order,
    catalog: &C,
    options: &DeductionOptions,
) -> Result<Vec<IngredientId>, InventoryError>
where
    C: RecipeCatalog + ?Sized,
{
    let mut ids = BTreeSet::new();
    for item in order.items() {
        if let Some((_, recipe)) = resolve_recipe(catalog, item, options)? {
            ids.extend(recipe.ingredients().iter().map(|line| line.ingredient_id()));
        }
    }
    Ok(ids.into_iter().collect())
}

/// Build the aggregated requirement mapping for `order`.
///
/// `ingredients` is the snapshot the recipes are resolved against.
pub fn aggregate_requirements<C>(
    order: &Order,
    catalog: &C,
    ingredients: &HashMap<IngredientId, Ingredient>,
    options: &DeductionOptions,
) -> Result<Requirements, InventoryError>
where
    C: RecipeCatalog + ?Sized,
{
    let mut requirements = Requirements::default();

    for item in order.items() {
        let Some((menu_item, recipe)) = resolve_recipe(catalog, item, options)? else {
            continue;
        };

        for line in recipe.ingredients() {
            let ingredient = ingredients.get(&line.ingredient_id()).ok_or_else(|| {
                InventoryError::MissingIngredient {
                    menu_item_id: menu_item.id_typed(),
                    menu_item: menu_item.name().to_string(),
                    ingredient_id: line.ingredient_id(),
                }
            })?;

            assert_compatible(line.unit(), ingredient.unit()).map_err(|source| {
                InventoryError::UnitMismatch {
                    ingredient_id: ingredient.id_typed(),
                    ingredient: ingredient.name().to_string(),
                    source,
                }
            })?;

            let required_base = line
                .required_for(item.quantity)
                .and_then(|amount| to_base(amount, line.unit()).ok())
                .ok_or_else(|| too_large(ingredient.name()))?;
            requirements.add(ingredient, required_base)?;
        }
    }

    Ok(requirements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use larder_core::{MenuItemId, OrderId, RecipeId};
    use larder_menu::{Menu, RecipeIngredient};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn ingredient(name: &str, stock: Decimal, unit: MeasurementUnit) -> Ingredient {
        Ingredient::new(IngredientId::new(), name, stock, unit, dec!(0)).unwrap()
    }

    fn snapshot(items: &[&Ingredient]) -> HashMap<IngredientId, Ingredient> {
        items.iter().map(|i| (i.id_typed(), (*i).clone())).collect()
    }

    fn menu_item(name: &str, lines: Vec<(IngredientId, Decimal, MeasurementUnit)>) -> MenuItem {
        let lines = lines
            .into_iter()
            .map(|(id, q, u)| RecipeIngredient::new(id, q, u).unwrap())
            .collect();
        MenuItem::new(MenuItemId::new(), name)
            .unwrap()
            .with_recipe(Recipe::new(RecipeId::new(), name, lines).unwrap())
    }

    fn menu(items: Vec<MenuItem>) -> Menu {
        let mut menu = Menu::new();
        for item in items {
            menu.add(item).unwrap();
        }
        menu
    }

    fn order(lines: Vec<(MenuItemId, u32)>) -> Order {
        Order::with_items(OrderId::new(), Utc::now(), lines).unwrap()
    }

    #[test]
    fn pizza_dough_scenario_requires_750_grams() {
        let flour = ingredient("Flour", dec!(5000), MeasurementUnit::Gram);
        let dough = menu_item(
            "Pizza Dough",
            vec![(flour.id_typed(), dec!(0.25), MeasurementUnit::Kilogram)],
        );
        let dough_id = dough.id_typed();
        let menu = menu(vec![dough]);

        let reqs = aggregate_requirements(
            &order(vec![(dough_id, 3)]),
            &menu,
            &snapshot(&[&flour]),
            &DeductionOptions::default(),
        )
        .unwrap();

        let flour_req = reqs.get(&flour.id_typed()).unwrap();
        assert_eq!(flour_req.required_base, dec!(750));
        assert_eq!(flour_req.base_unit(), MeasurementUnit::Gram);
        assert_eq!(flour_req.in_stock_unit(), Quantity::new(dec!(750), MeasurementUnit::Gram));
    }

    #[test]
    fn shared_ingredient_is_combined_across_recipes() {
        let cheese = ingredient("Mozzarella", dec!(10), MeasurementUnit::Kilogram);
        let basil = ingredient("Basil", dec!(100), MeasurementUnit::Piece);
        let pizza = menu_item(
            "Margherita",
            vec![
                (cheese.id_typed(), dec!(125), MeasurementUnit::Gram),
                (basil.id_typed(), dec!(3), MeasurementUnit::Piece),
            ],
        );
        let salad = menu_item(
            "Caprese",
            vec![(cheese.id_typed(), dec!(0.1), MeasurementUnit::Kilogram)],
        );
        let (pizza_id, salad_id) = (pizza.id_typed(), salad.id_typed());
        let menu = menu(vec![pizza, salad]);

        let reqs = aggregate_requirements(
            &order(vec![(pizza_id, 2), (salad_id, 1), (pizza_id, 1)]),
            &menu,
            &snapshot(&[&cheese, &basil]),
            &DeductionOptions::default(),
        )
        .unwrap();

        assert_eq!(reqs.len(), 2);
        // 3 × 125 g + 1 × 100 g
        let cheese_req = reqs.get(&cheese.id_typed()).unwrap();
        assert_eq!(cheese_req.required_base, dec!(475));
        assert_eq!(cheese_req.in_stock_unit(), Quantity::new(dec!(0.475), MeasurementUnit::Kilogram));
        assert_eq!(reqs.get(&basil.id_typed()).unwrap().required_base, dec!(9));
    }

    #[test]
    fn unknown_menu_item_is_missing_recipe() {
        let unknown = MenuItemId::new();
        let err = aggregate_requirements(
            &order(vec![(unknown, 1)]),
            &Menu::new(),
            &HashMap::new(),
            &DeductionOptions::default(),
        )
        .unwrap_err();

        match err {
            InventoryError::MissingRecipe { menu_item_id, .. } => assert_eq!(menu_item_id, unknown),
            other => panic!("Expected MissingRecipe, got {other:?}"),
        }
    }

    #[test]
    fn item_without_recipe_is_missing_recipe() {
        let soda = MenuItem::new(MenuItemId::new(), "Soda").unwrap();
        let soda_id = soda.id_typed();
        let err = aggregate_requirements(
            &order(vec![(soda_id, 1)]),
            &menu(vec![soda]),
            &HashMap::new(),
            &DeductionOptions::default(),
        )
        .unwrap_err();

        match err {
            InventoryError::MissingRecipe { menu_item, .. } => assert_eq!(menu_item, "Soda"),
            other => panic!("Expected MissingRecipe, got {other:?}"),
        }
    }

    #[test]
    fn empty_recipe_is_rejected_unless_allowed() {
        let water = menu_item("Bottled Water", vec![]);
        let water_id = water.id_typed();
        let menu = menu(vec![water]);
        let order = order(vec![(water_id, 2)]);

        let err =
            aggregate_requirements(&order, &menu, &HashMap::new(), &DeductionOptions::default())
                .unwrap_err();
        assert!(matches!(err, InventoryError::MissingRecipe { .. }));

        let lenient = DeductionOptions {
            allow_empty_recipes: true,
        };
        let reqs = aggregate_requirements(&order, &menu, &HashMap::new(), &lenient).unwrap();
        assert!(reqs.is_empty());
        assert!(referenced_ingredients(&order, &menu, &lenient).unwrap().is_empty());
    }

    #[test]
    fn dangling_ingredient_is_missing_ingredient() {
        let ghost = IngredientId::new();
        let item = menu_item("Ghost Soup", vec![(ghost, dec!(1), MeasurementUnit::Liter)]);
        let item_id = item.id_typed();

        let err = aggregate_requirements(
            &order(vec![(item_id, 1)]),
            &menu(vec![item]),
            &HashMap::new(),
            &DeductionOptions::default(),
        )
        .unwrap_err();

        match err {
            InventoryError::MissingIngredient {
                ingredient_id,
                menu_item,
                ..
            } => {
                assert_eq!(ingredient_id, ghost);
                assert_eq!(menu_item, "Ghost Soup");
            }
            other => panic!("Expected MissingIngredient, got {other:?}"),
        }
    }

    #[test]
    fn volume_recipe_against_weight_stock_is_unit_mismatch() {
        let sugar = ingredient("Sugar", dec!(1000), MeasurementUnit::Gram);
        let item = menu_item("Lemonade", vec![(sugar.id_typed(), dec!(50), MeasurementUnit::Milliliter)]);
        let item_id = item.id_typed();

        let err = aggregate_requirements(
            &order(vec![(item_id, 1)]),
            &menu(vec![item]),
            &snapshot(&[&sugar]),
            &DeductionOptions::default(),
        )
        .unwrap_err();

        assert!(err.is_definitional());
        match err {
            InventoryError::UnitMismatch { ingredient, .. } => assert_eq!(ingredient, "Sugar"),
            other => panic!("Expected UnitMismatch, got {other:?}"),
        }
    }

    #[test]
    fn oversized_requirements_are_rejected_not_panicked() {
        let oil = ingredient("Oil", dec!(1), MeasurementUnit::Liter);
        let vat = menu_item(
            "Vat",
            vec![(
                oil.id_typed(),
                Decimal::from_i128_with_scale(10_000_000_000_000_000_000, 0),
                MeasurementUnit::Liter,
            )],
        );
        let vat_id = vat.id_typed();
        let err = aggregate_requirements(
            &order(vec![(vat_id, 4_000_000_000)]),
            &menu(vec![vat]),
            &snapshot(&[&oil]),
            &DeductionOptions::default(),
        )
        .unwrap_err();
        match err {
            InventoryError::InvalidQuantity(msg) => assert!(msg.contains("'Oil'")),
            other => panic!("Expected InvalidQuantity, got {other:?}"),
        }

        // Each line fits on its own; the sum does not.
        let first = menu_item("First", vec![(oil.id_typed(), Decimal::MAX, MeasurementUnit::Milliliter)]);
        let second = menu_item("Second", vec![(oil.id_typed(), Decimal::MAX, MeasurementUnit::Milliliter)]);
        let (first_id, second_id) = (first.id_typed(), second.id_typed());
        let err = aggregate_requirements(
            &order(vec![(first_id, 1), (second_id, 1)]),
            &menu(vec![first, second]),
            &snapshot(&[&oil]),
            &DeductionOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, InventoryError::InvalidQuantity(_)));
    }

    #[test]
    fn referenced_ingredients_are_sorted_and_unique() {
        let a = ingredient("A", dec!(1), MeasurementUnit::Gram);
        let b = ingredient("B", dec!(1), MeasurementUnit::Gram);
        let first = menu_item(
            "First",
            vec![
                (b.id_typed(), dec!(1), MeasurementUnit::Gram),
                (a.id_typed(), dec!(1), MeasurementUnit::Gram),
            ],
        );
        let second = menu_item("Second", vec![(a.id_typed(), dec!(2), MeasurementUnit::Gram)]);
        let (first_id, second_id) = (first.id_typed(), second.id_typed());

        let ids = referenced_ingredients(
            &order(vec![(first_id, 1), (second_id, 4)]),
            &menu(vec![first, second]),
            &DeductionOptions::default(),
        )
        .unwrap();

        let mut expected = vec![a.id_typed(), b.id_typed()];
        expected.sort();
        assert_eq!(ids, expected);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: an ingredient shared by many lines gets exactly one requirement,
        /// equal to the sum of every line's contribution.
        #[test]
        fn shared_requirement_is_sum_of_lines(
            lines in prop::collection::vec((1u32..50, 1i64..5_000, any::<bool>()), 1..12)
        ) {
            let butter = ingredient("Butter", dec!(0), MeasurementUnit::Kilogram);
            let mut items = Vec::new();
            let mut order_lines = Vec::new();
            let mut expected = Decimal::ZERO;

            for (idx, (portions, grams, in_kg)) in lines.iter().enumerate() {
                let (qty, unit) = if *in_kg {
                    (Decimal::new(*grams, 3), MeasurementUnit::Kilogram)
                } else {
                    (Decimal::from(*grams), MeasurementUnit::Gram)
                };
                let item = menu_item(&format!("Dish {idx}"), vec![(butter.id_typed(), qty, unit)]);
                order_lines.push((item.id_typed(), *portions));
                items.push(item);
                expected += Decimal::from(*grams) * Decimal::from(*portions);
            }

            let reqs = aggregate_requirements(
                &order(order_lines),
                &menu(items),
                &snapshot(&[&butter]),
                &DeductionOptions::default(),
            )
            .unwrap();

            prop_assert_eq!(reqs.len(), 1);
            prop_assert_eq!(reqs.get(&butter.id_typed()).unwrap().required_base, expected);
        }
    }
}
