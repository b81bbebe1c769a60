use futures_util::Future;
use rocksdb::Options;
use tempfile::TempDir;

use crate::db::DB;

/// Create a database from a path.
pub fn setup_db(db_path: String) -> DB {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    rocksdb::DB::open(&opts, db_path)
        .expect("Failed to open db path")
        .into()
}

/// Create a temporary database for testing purposes.
///
/// Uses `/tmp`-equivalent so that any resource leak of the db files will eventually be
/// cleaned up, even if e.g. `TempDir`'s drop handler never runs due to a segfault etc
/// encountered during the test.
pub async fn run_test_db<T, Fut>(test: T)
where
    T: FnOnce(DB) -> Fut,
    Fut: Future<Output = ()>,
{
    let db_tmp_dir = TempDir::new().unwrap();
    let db = setup_db(db_tmp_dir.path().to_str().unwrap().into());
    test(db).await;
    let _ = rocksdb::DB::destroy(&Options::default(), db_tmp_dir);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::TypedDB;

    #[tokio::test]
    async fn typed_db_stores_and_retrieves_values() {
        run_test_db(|db| async move {
            let typed = TypedDB::new("widgets".to_owned(), db);

            typed
                .store_keyed_encodable("by_name", &"alice".to_string(), &42u32)
                .unwrap();
            typed
                .store_keyed_encodable("by_name", &"bob".to_string(), &7u32)
                .unwrap();

            let alice: Option<u32> = typed
                .retrieve_keyed_decodable("by_name", &"alice".to_string())
                .unwrap();
            assert_eq!(alice, Some(42));

            let missing: Option<u32> = typed
                .retrieve_keyed_decodable("by_name", &"carol".to_string())
                .unwrap();
            assert_eq!(missing, None);
        })
        .await;
    }

    #[tokio::test]
    async fn typed_db_prefix_iterator_scoped_to_entity() {
        run_test_db(|db| async move {
            let widgets = TypedDB::new("widgets".to_owned(), db.clone());
            let gadgets = TypedDB::new("gadgets".to_owned(), db);

            widgets
                .store_keyed_encodable("all", &1u32, &"w1".to_string())
                .unwrap();
            widgets
                .store_keyed_encodable("all", &2u32, &"w2".to_string())
                .unwrap();
            gadgets
                .store_keyed_encodable("all", &1u32, &"g1".to_string())
                .unwrap();

            let values: Vec<String> = widgets.prefix_iterator("all").collect();
            assert_eq!(values.len(), 2);
            assert!(values.contains(&"w1".to_string()));
            assert!(values.contains(&"w2".to_string()));
        })
        .await;
    }
}
