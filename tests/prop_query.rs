use bson::{Bson, Document, doc, oid::ObjectId};
use docrepo::{Field, FilterMode, QueryBuilder};
use proptest::prelude::*;

fn key(i: usize) -> Field {
    Field::new(format!("f{i}"))
}

#[derive(Debug, Clone)]
enum Sort {
    Asc(usize),
    Desc(usize),
}

proptest! {
    #[test]
    fn prop_fragments_compose_in_call_order(values in prop::collection::vec("[a-z]{1,8}", 1..12)) {
        let mut b = QueryBuilder::new();
        for (i, v) in values.iter().enumerate() {
            b = b.equal_string(key(i), v);
        }
        let q = b.build().unwrap();
        let expected: Vec<Document> = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut d = Document::new();
                d.insert(format!("f{i}"), v.as_str());
                d
            })
            .collect();
        prop_assert_eq!(q.filter_mode(), FilterMode::Fragments);
        prop_assert_eq!(q.fragments(), expected.as_slice());
        let and: Vec<Bson> = expected.into_iter().map(Bson::Document).collect();
        prop_assert_eq!(q.filter(), doc! {"$and": and});
    }

    #[test]
    fn prop_batch_discards_earlier_fragments(n in 1usize..10, ids in 1usize..6) {
        let oids: Vec<ObjectId> = (0..ids).map(|_| ObjectId::new()).collect();
        let hexes: Vec<String> = oids.iter().map(|o| o.to_hex()).collect();
        let mut b = QueryBuilder::new();
        for i in 0..n {
            b = b.greater_than(key(i), i64::try_from(i).unwrap());
        }
        let q = b.batch_get(Field::ID, &hexes).build().unwrap();
        prop_assert!(q.fragments().is_empty());
        prop_assert_eq!(q.filter_mode(), FilterMode::Batch);
        prop_assert_eq!(q.filter(), doc! {"_id": {"$in": oids}});
    }

    #[test]
    fn prop_raw_filter_wins_in_any_position(before in 0usize..5, after in 0usize..5, batch in any::<bool>()) {
        let mut b = QueryBuilder::new();
        for i in 0..before {
            b = b.is_null(key(i));
        }
        b = b.raw_query(Some(doc! {"raw": true}));
        for i in 0..after {
            b = b.exists(key(i));
        }
        if batch {
            b = b.batch_get(Field::ID, &[ObjectId::new().to_hex()]);
        }
        let q = b.build().unwrap();
        prop_assert_eq!(q.filter_mode(), FilterMode::Raw);
        prop_assert_eq!(q.filter(), doc! {"raw": true});
    }

    #[test]
    fn prop_first_sort_wins(sorts in prop::collection::vec(
        prop_oneof![(0usize..4).prop_map(Sort::Asc), (0usize..4).prop_map(Sort::Desc)],
        1..6,
    )) {
        let mut b = QueryBuilder::new();
        for s in &sorts {
            b = match s {
                Sort::Asc(i) => b.sort_asc(key(*i)),
                Sort::Desc(i) => b.sort_desc(key(*i)),
            };
        }
        let expected = match &sorts[0] {
            Sort::Asc(i) => { let mut d = Document::new(); d.insert(format!("f{i}"), 1); d }
            Sort::Desc(i) => { let mut d = Document::new(); d.insert(format!("f{i}"), -1); d }
        };
        let q = b.build().unwrap();
        prop_assert_eq!(q.find_options().sort.clone(), Some(expected));
    }

    #[test]
    fn prop_paging_only_when_limit_set(stages in 0usize..5, limit in prop::option::of(0i64..100), skip in 0u64..50) {
        let mut b = QueryBuilder::new();
        for i in 0..stages {
            b = b.match_stage(key(i), 1);
        }
        if let Some(l) = limit {
            b = b.limit(l);
        }
        let built = b.clone().skip(skip).build().unwrap();
        prop_assert_eq!(built.find_options().limit, limit);
        prop_assert_eq!(built.find_options().skip, skip);

        let q = b.skip(skip).aggregate().unwrap();
        match limit {
            Some(l) => {
                prop_assert_eq!(q.pipeline().len(), stages + 2);
                prop_assert_eq!(&q.pipeline()[stages], &doc! {"$skip": i64::try_from(skip).unwrap()});
                prop_assert_eq!(&q.pipeline()[stages + 1], &doc! {"$limit": l});
            }
            None => prop_assert_eq!(q.pipeline().len(), stages),
        }
    }

    #[test]
    fn prop_bad_hex_poisons_build_but_not_chaining(junk in "[g-z]{1,30}", tail in 0usize..4) {
        let mut b = QueryBuilder::new().after_id(&junk);
        for i in 0..tail {
            b = b.equal_int(key(i), 1);
        }
        prop_assert!(b.clone().build().is_err());
        prop_assert!(b.aggregate().is_err());
    }
}
