//! Property-based tests for the facade's arithmetic updates, batch inserts
//! and PostgreSQL placeholder numbering.

#[cfg(test)]
mod tests {
    use dbclient::core::db::postgres::numbered_placeholders;
    use dbclient::{params, DatabaseClient, Value};
    use proptest::prelude::*;

    fn ledger(balance: i64) -> DatabaseClient {
        let mut client = DatabaseClient::open_in_memory().unwrap();
        client
            .create_table("ledger", &[("id", "INTEGER PRIMARY KEY"), ("balance", "INTEGER")])
            .unwrap();
        client
            .insert("ledger", &["id", "balance"], &params![1, balance])
            .unwrap();
        client
    }

    fn balance(client: &mut DatabaseClient) -> i64 {
        let rows = client.fetch("ledger", &["balance"], "id = ?", &params![1]).unwrap();
        rows[0][0].as_i64().unwrap()
    }

    /// SQL fragments without quotes, so every `?` is a marker
    fn arb_unquoted_sql() -> impl Strategy<Value = String> {
        "[a-z =?,()]{0,60}"
    }

    proptest! {
        /// Adding then subtracting the same amount restores the balance
        #[test]
        fn prop_add_then_subtract_is_identity(start in -1_000_000i64..1_000_000, amount in -1_000i64..1_000) {
            let mut client = ledger(start);

            client.add_value("ledger", "balance", amount, "id = ?", &params![1]).unwrap();
            prop_assert_eq!(balance(&mut client), start + amount);

            client.subtract_value("ledger", "balance", amount, "id = ?", &params![1]).unwrap();
            prop_assert_eq!(balance(&mut client), start);
        }

        /// Arithmetic updates only touch the rows matched by the condition
        #[test]
        fn prop_add_value_respects_condition(amount in 1i64..100) {
            let mut client = ledger(10);
            client.insert("ledger", &["id", "balance"], &params![2, 10]).unwrap();

            client.add_value("ledger", "balance", amount, "id = ?", &params![2]).unwrap();

            prop_assert_eq!(balance(&mut client), 10);
            let other = client.fetch("ledger", &["balance"], "id = ?", &params![2]).unwrap();
            prop_assert_eq!(other[0][0].clone(), Value::Integer(10 + amount));
        }

        /// A batch insert stores every row, in order
        #[test]
        fn prop_batch_insert_stores_all_rows(names in prop::collection::vec("[a-z]{1,12}", 0..20)) {
            let mut client = DatabaseClient::open_in_memory().unwrap();
            client.create_table("names", &[("n", "TEXT")]).unwrap();

            let rows: Vec<Vec<Value>> = names.iter().map(|n| params![n.as_str()]).collect();
            let inserted = client.batch_insert("names", &["n"], &rows).unwrap();
            prop_assert_eq!(inserted as usize, names.len());

            let stored = client.execute_query("SELECT n FROM names ORDER BY rowid", &[]).unwrap();
            prop_assert_eq!(stored, rows);
        }

        /// Every unquoted `?` becomes a numbered marker, in order
        #[test]
        fn prop_placeholders_are_numbered_in_order(sql in arb_unquoted_sql()) {
            let rewritten = numbered_placeholders(&sql);
            let markers = sql.matches('?').count();

            prop_assert!(!rewritten.contains('?'));
            for n in 1..=markers {
                let marker = format!("${}", n);
                prop_assert!(rewritten.contains(&marker), "missing {}", marker);
            }
            let past_last = format!("${}", markers + 1);
            prop_assert!(!rewritten.contains(&past_last), "unexpected marker {}", past_last);
        }

        /// Quoted literals pass through unchanged
        #[test]
        fn prop_quoted_text_is_untouched(literal in "[a-z? ]{0,20}") {
            let sql = format!("SELECT '{}' WHERE a = ?", literal);
            let rewritten = numbered_placeholders(&sql);
            prop_assert_eq!(rewritten, format!("SELECT '{}' WHERE a = $1", literal));
        }
    }
}
