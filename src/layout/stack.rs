use super::{DataRange, StockTable};

/// Stock indices sorted by category, then by first-seen order.
///
/// # Panics
///
/// Panics when two distinct stocks share both keys, which aggregation never
/// produces.
pub fn stock_list(table: &StockTable) -> Vec<usize> {
    let stocks = table.as_slice();
    let mut order: Vec<usize> = (0..stocks.len()).collect();
    order.sort_by(|&a, &b| {
        stocks[a]
            .category
            .cmp(&stocks[b].category)
            .then_with(|| stocks[a].order.cmp(&stocks[b].order))
    });
    for pair in order.windows(2) {
        let (a, b) = (&stocks[pair[0]], &stocks[pair[1]]);
        assert!(
            a.category != b.category || a.order != b.order,
            "can't sort stocks:\n{a:?}\n{b:?}"
        );
    }
    order
}

/// Stacks the stocks of each category bottom-up in `order`, leaving
/// `stock_pad` between neighbours, and clears the flow placeholders.
pub fn stack(table: &mut StockTable, order: &[usize], stock_pad: f64) {
    let mut category = None;
    let mut cursor = 0.0;
    for &idx in order {
        let stock = &mut table[idx];
        stock.source_placeholder = 0.0;
        stock.receptor_placeholder = 0.0;
        if category != Some(stock.category) {
            cursor = 0.0;
            category = Some(stock.category);
        } else {
            cursor += stock_pad;
        }
        stock.min = cursor;
        stock.max = cursor + stock.size();
        cursor = stock.max;
    }
}

/// Bounding box over every category and stacked stock extent. Only
/// meaningful after [`stack`].
pub fn data_range(table: &StockTable) -> DataRange {
    let mut range = DataRange::EMPTY;
    for category in table.categories() {
        let c = category as f64;
        range.category_min = range.category_min.min(c);
        range.category_max = range.category_max.max(c);
    }
    for stock in table.iter() {
        range.value_min = range.value_min.min(stock.min);
        range.value_max = range.value_max.max(stock.max);
    }
    range
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Flow;

    fn stacked(flows: &[Flow], pad: f64) -> (StockTable, Vec<usize>) {
        let mut table = StockTable::build(flows).unwrap();
        let order = stock_list(&table);
        stack(&mut table, &order, pad);
        (table, order)
    }

    fn fruit() -> Vec<Flow> {
        vec![
            Flow::new(0, "Large", 1, "Mohamed", 5.0),
            Flow::new(0, "Small", 1, "Mohamed", 2.0),
            Flow::new(0, "Large", 1, "Sofia", 3.0),
            Flow::new(1, "Sofia", 2, "Waste", 0.5),
            Flow::new(0, "Large", 2, "Eaten", 1.0),
        ]
    }

    #[test]
    fn list_sorts_by_category_then_order() {
        let (table, order) = stacked(&fruit(), 0.0);
        let keys: Vec<(i32, &str)> = order
            .iter()
            .map(|&idx| (table[idx].category, table[idx].label.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (0, "Large"),
                (0, "Small"),
                (1, "Mohamed"),
                (1, "Sofia"),
                (2, "Waste"),
                (2, "Eaten"),
            ]
        );
    }

    #[test]
    fn stocks_stack_without_gaps_and_reset_per_category() {
        let (table, order) = stacked(&fruit(), 0.0);
        let mut previous: Option<(i32, f64)> = None;
        for &idx in &order {
            let stock = &table[idx];
            assert_eq!(stock.max - stock.min, stock.size());
            match previous {
                Some((category, max)) if category == stock.category => {
                    assert_eq!(stock.min, max)
                }
                _ => assert_eq!(stock.min, 0.0),
            }
            previous = Some((stock.category, stock.max));
        }
        assert_eq!(table.get(0, "Small").unwrap().min, 9.0);
        assert_eq!(table.get(1, "Sofia").unwrap().min, 7.0);
    }

    #[test]
    fn padding_separates_neighbours_only() {
        let (table, _) = stacked(&fruit(), 2.0);
        assert_eq!(table.get(0, "Large").unwrap().min, 0.0);
        assert_eq!(table.get(0, "Small").unwrap().min, 11.0);
        assert_eq!(table.get(2, "Waste").unwrap().min, 0.0);
        assert_eq!(table.get(2, "Eaten").unwrap().min, 2.5);
    }

    #[test]
    fn stacking_is_idempotent_and_clears_placeholders() {
        let (mut table, order) = stacked(&fruit(), 0.0);
        table[order[0]].source_placeholder = 4.0;
        table[order[2]].receptor_placeholder = 1.0;
        let before: Vec<(f64, f64)> = table.iter().map(|s| (s.min, s.max)).collect();
        stack(&mut table, &order, 0.0);
        let after: Vec<(f64, f64)> = table.iter().map(|s| (s.min, s.max)).collect();
        assert_eq!(before, after);
        assert!(
            table
                .iter()
                .all(|s| s.source_placeholder == 0.0 && s.receptor_placeholder == 0.0)
        );
    }

    #[test]
    fn unbalanced_stock_is_sized_by_larger_side() {
        let flows = vec![
            Flow::new(0, "in", 1, "Sofia", 3.0),
            Flow::new(1, "Sofia", 2, "out", 3.5),
        ];
        let (table, _) = stacked(&flows, 0.0);
        let sofia = table.get(1, "Sofia").unwrap();
        assert_eq!(sofia.max, sofia.min + 3.5);
    }

    #[test]
    fn data_range_spans_categories_and_values() {
        let (table, _) = stacked(&fruit(), 0.0);
        let range = data_range(&table);
        assert_eq!(range.category_min, 0.0);
        assert_eq!(range.category_max, 2.0);
        assert_eq!(range.value_min, 0.0);
        assert_eq!(range.value_max, 11.0);
        assert!(!range.is_empty());
    }

    #[test]
    fn empty_table_has_empty_range() {
        let table = StockTable::build(&[]).unwrap();
        assert!(stock_list(&table).is_empty());
        assert!(data_range(&table).is_empty());
    }
}
