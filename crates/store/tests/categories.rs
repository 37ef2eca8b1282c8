use sea_orm::ConnectionTrait;
use store::{
    AmountRange, Category, CategoryPatch, CategoryRules, CategoryStatus, CategoryType, ErrorKind,
    NewCategory, RepositoryError,
};
use uuid::Uuid;

mod common;

fn coffee_rules() -> CategoryRules {
    CategoryRules {
        keywords: vec!["coffee".to_string()],
        merchant_patterns: vec!["Starbucks.*".to_string()],
        amount_ranges: vec![AmountRange {
            min: Some(1.0),
            max: Some(20.0),
        }],
        ..Default::default()
    }
}

#[tokio::test]
async fn create_derives_slug_and_appends_to_siblings() {
    let store = common::store().await;
    let food = common::category(&store, "Food & Dining").await;
    let bills = common::category(&store, "Bills").await;

    assert_eq!(food.slug, "food-dining");
    assert!(food.is_root());
    assert!(bills.sort_order > food.sort_order);

    let found = store.categories().find_by_slug("food-dining").await.unwrap();
    assert_eq!(found.map(|c| c.id), Some(food.id));
}

#[tokio::test]
async fn duplicate_slug_is_rejected_before_insert() {
    let store = common::store().await;
    common::category(&store, "Groceries").await;

    let err = store
        .categories()
        .create_category(NewCategory::named("groceries", CategoryType::Expense))
        .await
        .unwrap_err();

    assert!(matches!(err, RepositoryError::Validation(_)), "{err}");
    assert!(!store.categories().is_slug_available("groceries", None).await.unwrap());
}

#[tokio::test]
async fn update_rechecks_the_slug() {
    let store = common::store().await;
    common::category(&store, "Rent").await;
    let travel = common::category(&store, "Travel").await;

    let err = store
        .categories()
        .update_category(
            travel.id,
            CategoryPatch {
                slug: Some("rent".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let renamed = store
        .categories()
        .update_category(
            travel.id,
            CategoryPatch {
                name: Some("Trips".to_string()),
                slug: Some("travel".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(renamed.name, "Trips");
}

#[tokio::test]
async fn tree_is_breadth_first_and_depth_bounded() {
    let store = common::store().await;
    let root = common::category(&store, "Root").await;
    let a = common::child(&store, "A", root.id).await;
    let b = common::child(&store, "B", root.id).await;
    let a1 = common::child(&store, "A1", a.id).await;
    common::child(&store, "A1x", a1.id).await;

    let tree = store
        .categories()
        .find_category_tree(Some(root.id), 2)
        .await
        .unwrap();

    let shape: Vec<(Uuid, u32)> = tree.iter().map(|n| (n.category.id, n.depth)).collect();
    assert_eq!(shape, vec![(root.id, 0), (a.id, 1), (b.id, 1), (a1.id, 2)]);
    assert!(tree.iter().all(|n| n.depth <= 2));

    let whole = store.categories().find_category_tree(None, 10).await.unwrap();
    assert_eq!(whole.len(), 5);
}

#[tokio::test]
async fn tree_skips_inactive_branches() {
    let store = common::store().await;
    let root = common::category(&store, "Root").await;
    let hidden = common::child(&store, "Hidden", root.id).await;
    common::child(&store, "Below hidden", hidden.id).await;
    store
        .categories()
        .set_status(hidden.id, CategoryStatus::Inactive)
        .await
        .unwrap();

    let tree = store
        .categories()
        .find_category_tree(Some(root.id), 10)
        .await
        .unwrap();
    assert_eq!(tree.len(), 1);

    let children = store
        .categories()
        .find_child_categories(root.id, true)
        .await
        .unwrap();
    assert_eq!(children.len(), 1);
    assert!(
        store
            .categories()
            .find_child_categories(root.id, false)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn walks_terminate_on_a_hand_written_cycle() {
    let store = common::store().await;
    let a = common::category(&store, "A").await;
    let b = common::child(&store, "B", a.id).await;
    common::raw(
        &store,
        "UPDATE categories SET parent_id = ? WHERE id = ?",
        vec![b.id.into(), a.id.into()],
    )
    .await;

    let tree = store
        .categories()
        .find_category_tree(Some(a.id), 50)
        .await
        .unwrap();
    assert_eq!(tree.len(), 2);

    let ancestors = store.categories().find_ancestors(a.id, 50).await.unwrap();
    assert_eq!(ancestors.iter().map(|c| c.id).collect::<Vec<_>>(), vec![b.id]);

    let below = store.categories().find_descendant_ids(a.id, 50).await.unwrap();
    assert_eq!(below, vec![b.id]);

    let c = common::category(&store, "C").await;
    let err = store
        .categories()
        .move_category(c.id, Some(a.id))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidState(_)), "{err}");
}

#[tokio::test]
async fn ancestors_run_from_the_root_down() {
    let store = common::store().await;
    let root = common::category(&store, "Root").await;
    let mid = common::child(&store, "Mid", root.id).await;
    let leaf = common::child(&store, "Leaf", mid.id).await;

    let path = store.categories().find_ancestors(leaf.id, 10).await.unwrap();
    assert_eq!(path.iter().map(|c| c.id).collect::<Vec<_>>(), vec![root.id, mid.id]);

    let capped = store.categories().find_ancestors(leaf.id, 1).await.unwrap();
    assert_eq!(capped.iter().map(|c| c.id).collect::<Vec<_>>(), vec![mid.id]);
    assert!(store.categories().find_ancestors(root.id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn moves_that_would_create_a_cycle_are_rejected() {
    let store = common::store().await;
    let root = common::category(&store, "Root").await;
    let child = common::child(&store, "Child", root.id).await;
    let grandchild = common::child(&store, "Grandchild", child.id).await;

    for target in [root.id, child.id, grandchild.id] {
        let err = store
            .categories()
            .move_category(root.id, Some(target))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }

    let unchanged = store.categories().find_by_id(root.id).await.unwrap().unwrap();
    assert_eq!(unchanged.parent_id, None);
}

#[tokio::test]
async fn move_appends_under_the_new_parent() {
    let store = common::store().await;
    let home = common::category(&store, "Home").await;
    let existing = common::child(&store, "Utilities", home.id).await;
    let rent = common::category(&store, "Rent").await;

    let moved = store
        .categories()
        .move_category(rent.id, Some(home.id))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(moved.parent_id, Some(home.id));
    assert!(moved.sort_order > existing.sort_order);
    assert!(moved.updated_at >= rent.updated_at);

    let back = store
        .categories()
        .move_category(rent.id, None)
        .await
        .unwrap()
        .unwrap();
    assert!(back.is_root());
    assert!(
        store
            .categories()
            .move_category(Uuid::new_v4(), None)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn reorder_sets_positions_for_the_whole_sibling_set() {
    let store = common::store().await;
    let parent = common::category(&store, "Parent").await;
    let first = common::child(&store, "First", parent.id).await;
    let second = common::child(&store, "Second", parent.id).await;
    let third = common::child(&store, "Third", parent.id).await;

    store
        .categories()
        .reorder_categories(Some(parent.id), &[third.id, first.id, second.id])
        .await
        .unwrap();

    let order: Vec<Uuid> = store
        .categories()
        .find_child_categories(parent.id, false)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(order, vec![third.id, first.id, second.id]);

    let err = store
        .categories()
        .reorder_categories(Some(parent.id), &[first.id, second.id])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = store
        .categories()
        .reorder_categories(Some(parent.id), &[first.id, first.id, third.id])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn reorder_ignores_archived_siblings() {
    let store = common::store().await;
    let parent = common::category(&store, "Parent").await;
    let kept = common::child(&store, "Kept", parent.id).await;
    let other = common::child(&store, "Other", parent.id).await;
    let retired = common::child(&store, "Retired", parent.id).await;
    store
        .categories()
        .archive_and_reassign(retired.id, kept.id)
        .await
        .unwrap();

    let listed: Vec<Uuid> = store
        .categories()
        .find_child_categories(parent.id, true)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(listed.len(), 2);

    store
        .categories()
        .reorder_categories(Some(parent.id), &[other.id, kept.id])
        .await
        .unwrap();
    let order: Vec<Uuid> = store
        .categories()
        .find_child_categories(parent.id, true)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(order, vec![other.id, kept.id]);
}

#[tokio::test]
async fn save_cannot_bypass_tree_operations() {
    let store = common::store().await;
    let root = common::category(&store, "Root").await;
    let child = common::child(&store, "Child", root.id).await;

    let mut cyclic = root.clone();
    cyclic.parent_id = Some(child.id);
    let err = store.categories().save(&cyclic).await.unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidState(_)), "{err}");

    let mut archived = root.clone();
    archived.status = CategoryStatus::Archived;
    let err = store.categories().save(&archived).await.unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidState(_)), "{err}");

    let mut own_parent = child.clone();
    own_parent.parent_id = Some(child.id);
    let err = store.categories().save(&own_parent).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);

    for broken in [
        Category {
            name: "   ".to_string(),
            ..root.clone()
        },
        Category {
            slug: "Not A Slug".to_string(),
            ..root.clone()
        },
    ] {
        let err = store.categories().save(&broken).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    let stored = store.categories().find_by_id(root.id).await.unwrap().unwrap();
    assert_eq!(stored.parent_id, None);
    assert_eq!(stored.status, CategoryStatus::Active);
    assert_eq!(stored.name, "Root");

    let mut renamed = stored;
    renamed.name = "Everything".to_string();
    let saved = store.categories().save(&renamed).await.unwrap();
    assert_eq!(saved.name, "Everything");
}

#[tokio::test]
async fn archive_moves_transactions_to_the_replacement() {
    let store = common::store().await;
    let owner = common::user(&store, "alice@example.com").await;
    let account = common::account(&store, owner.id, "Checking").await;
    let old = common::category(&store, "Old").await;
    let new = common::category(&store, "New").await;
    let tx = common::debit(&store, account.id, 12_00, common::day(3), "Lunch").await;
    store
        .transactions()
        .assign_category(&[tx.id], Some(old.id))
        .await
        .unwrap();

    let moved = store
        .categories()
        .archive_and_reassign(old.id, new.id)
        .await
        .unwrap();
    assert_eq!(moved, Some(1));

    let archived = store.categories().find_by_id(old.id).await.unwrap().unwrap();
    assert_eq!(archived.status, CategoryStatus::Archived);
    let tx = store.transactions().find_by_id(tx.id).await.unwrap().unwrap();
    assert_eq!(tx.category_id, Some(new.id));

    let err = store
        .categories()
        .set_status(old.id, CategoryStatus::Active)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidState(_)), "{err}");
    let err = store
        .categories()
        .set_status(new.id, CategoryStatus::Archived)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidState(_)), "{err}");
}

#[tokio::test]
async fn failed_archive_leaves_transactions_untouched() {
    let store = common::store().await;
    let owner = common::user(&store, "alice@example.com").await;
    let account = common::account(&store, owner.id, "Checking").await;
    let old = common::category(&store, "Old").await;
    let new = common::category(&store, "New").await;
    let tx = common::debit(&store, account.id, 12_00, common::day(3), "Lunch").await;
    store
        .transactions()
        .assign_category(&[tx.id], Some(old.id))
        .await
        .unwrap();

    // The reassignment succeeds, then the archive step fails.
    store
        .database()
        .execute_unprepared(
            "CREATE TRIGGER block_archive BEFORE UPDATE OF status ON categories \
             WHEN NEW.status = 'archived' \
             BEGIN SELECT RAISE(ABORT, 'archive blocked'); END;",
        )
        .await
        .unwrap();

    let err = store
        .categories()
        .archive_and_reassign(old.id, new.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);

    let tx = store.transactions().find_by_id(tx.id).await.unwrap().unwrap();
    assert_eq!(tx.category_id, Some(old.id));
    let old = store.categories().find_by_id(old.id).await.unwrap().unwrap();
    assert_eq!(old.status, CategoryStatus::Active);
}

#[tokio::test]
async fn merge_folds_source_into_target() {
    let store = common::store().await;
    let owner = common::user(&store, "alice@example.com").await;
    let account = common::account(&store, owner.id, "Checking").await;
    let source = common::category(&store, "Eating out").await;
    let target = common::category(&store, "Food").await;
    let sub = common::child(&store, "Pizza", source.id).await;
    let tx = common::debit(&store, account.id, 25_00, common::day(4), "Pizza place").await;
    store
        .transactions()
        .assign_category(&[tx.id], Some(source.id))
        .await
        .unwrap();

    let outcome = store
        .categories()
        .merge_categories(source.id, target.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.transactions_moved, 1);
    assert_eq!(outcome.children_moved, 1);

    let sub = store.categories().find_by_id(sub.id).await.unwrap().unwrap();
    assert_eq!(sub.parent_id, Some(target.id));
    let source = store.categories().find_by_id(source.id).await.unwrap().unwrap();
    assert_eq!(source.status, CategoryStatus::Archived);
    let tx = store.transactions().find_by_id(tx.id).await.unwrap().unwrap();
    assert_eq!(tx.category_id, Some(target.id));
}

#[tokio::test]
async fn merge_into_own_subtree_is_rejected() {
    let store = common::store().await;
    let parent = common::category(&store, "Parent").await;
    let kid = common::child(&store, "Kid", parent.id).await;

    let err = store
        .categories()
        .merge_categories(parent.id, kid.id)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidState(_)), "{err}");

    let kid = store.categories().find_by_id(kid.id).await.unwrap().unwrap();
    assert_eq!(kid.parent_id, Some(parent.id));
}

#[tokio::test]
async fn delete_lifts_children_and_uncategorizes_transactions() {
    let store = common::store().await;
    let owner = common::user(&store, "alice@example.com").await;
    let account = common::account(&store, owner.id, "Checking").await;
    let top = common::category(&store, "Top").await;
    let middle = common::child(&store, "Middle", top.id).await;
    let bottom = common::child(&store, "Bottom", middle.id).await;
    let tx = common::debit(&store, account.id, 3_00, common::day(5), "Snack").await;
    store
        .transactions()
        .assign_category(&[tx.id], Some(middle.id))
        .await
        .unwrap();

    assert!(store.categories().delete_category(middle.id).await.unwrap());
    assert!(!store.categories().delete_category(middle.id).await.unwrap());

    let bottom = store.categories().find_by_id(bottom.id).await.unwrap().unwrap();
    assert_eq!(bottom.parent_id, Some(top.id));
    let tx = store.transactions().find_by_id(tx.id).await.unwrap().unwrap();
    assert_eq!(tx.category_id, None);
}

#[tokio::test]
async fn system_categories_cannot_be_deleted() {
    let store = common::store().await;
    let system = store
        .categories()
        .create_category(NewCategory {
            is_system: true,
            ..NewCategory::named("Transfers", CategoryType::Transfer)
        })
        .await
        .unwrap();

    let err = store.categories().delete_category(system.id).await.unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidState(_)), "{err}");
    assert!(store.categories().find_by_id(system.id).await.unwrap().is_some());
}

#[tokio::test]
async fn matching_ranks_categories_by_rule_score() {
    let store = common::store().await;
    let coffee = common::ruled(&store, "Coffee", coffee_rules()).await;
    let snacks = common::ruled(
        &store,
        "Snacks",
        CategoryRules {
            amount_ranges: vec![AmountRange {
                min: None,
                max: Some(10.0),
            }],
            ..Default::default()
        },
    )
    .await;
    common::category(&store, "No rules").await;

    let matches = store
        .categories()
        .find_matching_categories(Some("Starbucks #4521"), Some(""), Some(5.50))
        .await
        .unwrap();

    let ranked: Vec<(Uuid, u32)> = matches.iter().map(|m| (m.category.id, m.score)).collect();
    assert_eq!(ranked, vec![(coffee.id, 20), (snacks.id, 5)]);
}

#[tokio::test]
async fn suggestion_needs_auto_assign_and_threshold() {
    let store = common::store().await;
    let coffee = common::ruled(
        &store,
        "Coffee",
        CategoryRules {
            auto_assign: true,
            confidence_threshold: Some(25),
            ..coffee_rules()
        },
    )
    .await;

    let weak = store
        .categories()
        .suggest_category(Some("Starbucks"), None, Some(5.0))
        .await
        .unwrap();
    assert!(weak.is_none());

    let strong = store
        .categories()
        .suggest_category(Some("Starbucks"), Some("coffee"), Some(5.0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(strong.category.id, coffee.id);
    assert_eq!(strong.score, 30);
}
