//! Category tree engine.
//!
//! The tree is an adjacency list (`parent_id`). Every walk is bounded twice:
//! by an explicit depth cap and by a visited set, so a malformed graph (for
//! example a cycle written by hand) can never make a traversal loop.

use std::collections::HashSet;

use sea_orm::{
    Condition, Order, QueryFilter, QuerySelect, prelude::*, sea_query::SimpleExpr,
};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    base::{FindOptions, Record, Repository},
    extends_repository, with_tx,
};
use crate::{
    Category, CategoryMatch, CategoryNode, CategoryPatch, CategoryStatus, CategoryType,
    MergeOutcome, NewCategory, RepositoryError, ResultRepo,
    error::StorageContext,
    rules,
    schema::{categories, transactions},
    validation::validate_new_category,
};

/// Upper bound for parent-pointer walks that have no caller-supplied depth.
const MAX_WALK_DEPTH: u32 = 256;

#[derive(Clone, Debug)]
pub struct CategoryRepository {
    base: Repository<Category>,
}

extends_repository!(CategoryRepository, Category);

fn parent_is(parent_id: Option<Uuid>) -> SimpleExpr {
    match parent_id {
        Some(id) => categories::Column::ParentId.eq(id),
        None => categories::Column::ParentId.is_null(),
    }
}

fn is_active() -> SimpleExpr {
    categories::Column::Status.eq(CategoryStatus::Active.as_str())
}

fn sibling_order(options: FindOptions<Category>) -> FindOptions<Category> {
    options
        .order_by(categories::Column::SortOrder, Order::Asc)
        .order_by(categories::Column::Name, Order::Asc)
}

async fn load<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    operation: &str,
) -> ResultRepo<Option<Category>> {
    categories::Entity::find_by_id(id)
        .one(db)
        .await
        .context(operation)?
        .map(Category::from_model)
        .transpose()
}

async fn parent_of<C: ConnectionTrait>(db: &C, id: Uuid) -> ResultRepo<Option<Uuid>> {
    let parent: Option<Option<Uuid>> = categories::Entity::find_by_id(id)
        .select_only()
        .column(categories::Column::ParentId)
        .into_tuple()
        .one(db)
        .await
        .context("read category parent")?;
    Ok(parent.flatten())
}

/// Sort key placing a new node after every existing sibling.
async fn next_sort_order<C: ConnectionTrait>(db: &C, parent_id: Option<Uuid>) -> ResultRepo<i32> {
    let max: Option<Option<i32>> = categories::Entity::find()
        .select_only()
        .column_as(Expr::col(categories::Column::SortOrder).max(), "max_sort_order")
        .filter(parent_is(parent_id))
        .into_tuple()
        .one(db)
        .await
        .context("read category sort order")?;
    Ok(max.flatten().unwrap_or_default() + 1)
}

/// Breadth-first ids below `id` (any status), at most `max_depth` levels.
async fn descendant_ids<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    max_depth: u32,
) -> ResultRepo<Vec<Uuid>> {
    let mut visited = HashSet::from([id]);
    let mut out = Vec::new();
    let mut frontier = vec![id];
    let mut depth = 0;
    while !frontier.is_empty() && depth < max_depth {
        let children: Vec<Uuid> = categories::Entity::find()
            .select_only()
            .column(categories::Column::Id)
            .filter(categories::Column::ParentId.is_in(frontier))
            .into_tuple()
            .all(db)
            .await
            .context("list category descendants")?;
        frontier = children
            .into_iter()
            .filter(|child| visited.insert(*child))
            .collect();
        out.extend(frontier.iter().copied());
        depth += 1;
    }
    Ok(out)
}

impl CategoryRepository {
    /// Creates a category, deriving its slug from the name when absent.
    ///
    /// A taken slug is rejected up front; a concurrent insert of the same
    /// slug still fails on the unique index. A zero `sort_order` places the
    /// node after its siblings.
    pub async fn create_category(&self, input: NewCategory) -> ResultRepo<Category> {
        let mut input = validate_new_category(input)?;
        let slug = input.slug.clone().unwrap_or_default();
        if !self.is_slug_available(&slug, None).await? {
            return Err(RepositoryError::Validation(format!(
                "category slug already in use: {slug}"
            )));
        }
        if let Some(parent_id) = input.parent_id {
            let parent = self.find_by_id(parent_id).await?.ok_or_else(|| {
                RepositoryError::Validation(format!("parent category {parent_id} not found"))
            })?;
            if parent.status == CategoryStatus::Archived {
                return Err(RepositoryError::InvalidState(format!(
                    "cannot add children to archived category {parent_id}"
                )));
            }
        }
        if input.sort_order == 0 {
            input.sort_order = next_sort_order(&self.db, input.parent_id).await?;
        }
        self.create(input).await
    }

    /// Field update with the slug re-checked against other categories.
    pub async fn update_category(
        &self,
        id: Uuid,
        patch: CategoryPatch,
    ) -> ResultRepo<Option<Category>> {
        if let Some(slug) = patch.slug.as_deref()
            && !self.is_slug_available(slug.trim(), Some(id)).await?
        {
            return Err(RepositoryError::Validation(format!(
                "category slug already in use: {}",
                slug.trim()
            )));
        }
        self.update(id, patch).await
    }

    pub async fn find_by_slug(&self, slug: &str) -> ResultRepo<Option<Category>> {
        self.find_one(Condition::all().add(categories::Column::Slug.eq(slug.trim())))
            .await
    }

    pub async fn is_slug_available(&self, slug: &str, exclude: Option<Uuid>) -> ResultRepo<bool> {
        let mut condition = Condition::all().add(categories::Column::Slug.eq(slug));
        if let Some(id) = exclude {
            condition = condition.add(categories::Column::Id.ne(id));
        }
        Ok(!self.exists(condition).await?)
    }

    /// Active top-level categories, optionally of one type.
    pub async fn find_root_categories(
        &self,
        category_type: Option<CategoryType>,
    ) -> ResultRepo<Vec<Category>> {
        let mut condition = Condition::all().add(parent_is(None)).add(is_active());
        if let Some(category_type) = category_type {
            condition =
                condition.add(categories::Column::CategoryType.eq(category_type.as_str()));
        }
        self.find(sibling_order(FindOptions::filter(condition))).await
    }

    /// Direct children. Archived nodes are never listed; inactive ones only
    /// on request.
    pub async fn find_child_categories(
        &self,
        parent_id: Uuid,
        include_inactive: bool,
    ) -> ResultRepo<Vec<Category>> {
        let status = if include_inactive {
            categories::Column::Status.ne(CategoryStatus::Archived.as_str())
        } else {
            is_active()
        };
        let condition = Condition::all().add(parent_is(Some(parent_id))).add(status);
        self.find(sibling_order(FindOptions::filter(condition))).await
    }

    /// Flattened breadth-first walk from `root_id` (or from every active
    /// root), ordered by depth then sort order then name.
    ///
    /// The starting nodes sit at depth 0 and no node deeper than `max_depth`
    /// is returned. Below the start only active nodes are followed.
    pub async fn find_category_tree(
        &self,
        root_id: Option<Uuid>,
        max_depth: u32,
    ) -> ResultRepo<Vec<CategoryNode>> {
        let mut frontier: Vec<Category> = match root_id {
            Some(id) => self.find_by_id(id).await?.into_iter().collect(),
            None => self.find_root_categories(None).await?,
        };

        let mut visited = HashSet::new();
        let mut nodes = Vec::new();
        let mut depth = 0;
        loop {
            frontier.retain(|category| visited.insert(category.id));
            if frontier.is_empty() {
                break;
            }
            let ids: Vec<Uuid> = frontier.iter().map(|category| category.id).collect();
            nodes.extend(
                frontier
                    .into_iter()
                    .map(|category| CategoryNode { category, depth }),
            );
            if depth >= max_depth {
                break;
            }
            depth += 1;

            let condition = Condition::all()
                .add(categories::Column::ParentId.is_in(ids))
                .add(is_active());
            frontier = self.find(sibling_order(FindOptions::filter(condition))).await?;
        }
        Ok(nodes)
    }

    /// Path from the top of the tree down to the parent of `id` (root first).
    /// Empty for roots and unknown ids.
    pub async fn find_ancestors(&self, id: Uuid, max_depth: u32) -> ResultRepo<Vec<Category>> {
        let Some(node) = self.find_by_id(id).await? else {
            return Ok(Vec::new());
        };

        let mut visited = HashSet::from([node.id]);
        let mut chain = Vec::new();
        let mut next = node.parent_id;
        while let Some(parent_id) = next {
            if chain.len() >= max_depth as usize || !visited.insert(parent_id) {
                break;
            }
            let Some(parent) = self.find_by_id(parent_id).await? else {
                break;
            };
            next = parent.parent_id;
            chain.push(parent);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Ids of every node below `id`, whatever their status.
    pub async fn find_descendant_ids(&self, id: Uuid, max_depth: u32) -> ResultRepo<Vec<Uuid>> {
        descendant_ids(&self.db, id, max_depth).await
    }

    /// Reparents `id` under `new_parent_id` (or makes it a root) and appends
    /// it after its new siblings.
    ///
    /// Rejects moves that would put a node under itself or under one of its
    /// own descendants.
    pub async fn move_category(
        &self,
        id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> ResultRepo<Option<Category>> {
        if new_parent_id == Some(id) {
            return Err(RepositoryError::InvalidState(format!(
                "category {id} cannot be its own parent"
            )));
        }
        let operation = "move category";
        let moved = with_tx!(self, operation, |db_tx| {
            self.move_in(&db_tx, id, new_parent_id).await
        })?;
        if moved {
            self.find_by_id(id).await
        } else {
            Ok(None)
        }
    }

    async fn move_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> ResultRepo<bool> {
        let operation = "move category";
        let Some(node) = load(db, id, operation).await? else {
            return Ok(false);
        };
        if let Some(parent_id) = new_parent_id {
            let parent = load(db, parent_id, operation).await?.ok_or_else(|| {
                RepositoryError::Validation(format!("parent category {parent_id} not found"))
            })?;
            if parent.status == CategoryStatus::Archived {
                return Err(RepositoryError::InvalidState(format!(
                    "cannot move under archived category {parent_id}"
                )));
            }
            Self::ensure_not_ancestor(db, id, &parent).await?;
        }
        if node.parent_id == new_parent_id {
            return Ok(true);
        }

        let sort_order = next_sort_order(db, new_parent_id).await?;
        self.set_columns(
            db,
            operation,
            categories::Column::Id.eq(id),
            vec![
                (categories::Column::ParentId, Expr::value(new_parent_id)),
                (categories::Column::SortOrder, Expr::value(sort_order)),
            ],
        )
        .await?;
        debug!(
            category_id = %id,
            from = ?node.parent_id,
            to = ?new_parent_id,
            "category moved"
        );
        Ok(true)
    }

    /// Walks up from `parent` and fails if `id` is on the way to the root.
    async fn ensure_not_ancestor<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        parent: &Category,
    ) -> ResultRepo<()> {
        let mut visited = HashSet::from([parent.id]);
        let mut next = parent.parent_id;
        let mut steps = 0;
        while let Some(ancestor) = next {
            if ancestor == id {
                return Err(RepositoryError::InvalidState(format!(
                    "moving category {id} under {} would create a cycle",
                    parent.id
                )));
            }
            if !visited.insert(ancestor) || steps >= MAX_WALK_DEPTH {
                return Err(RepositoryError::InvalidState(format!(
                    "ancestors of category {} do not reach a root",
                    parent.id
                )));
            }
            next = parent_of(db, ancestor).await?;
            steps += 1;
        }
        Ok(())
    }

    /// Sets `sort_order = position + 1` for the children of `parent_id`.
    ///
    /// `ordered_ids` must list every non-archived child of that parent
    /// exactly once; the whole reorder commits or nothing does.
    pub async fn reorder_categories(
        &self,
        parent_id: Option<Uuid>,
        ordered_ids: &[Uuid],
    ) -> ResultRepo<()> {
        let mut seen = HashSet::new();
        if let Some(duplicate) = ordered_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(RepositoryError::Validation(format!(
                "category {duplicate} listed twice in reorder"
            )));
        }

        let operation = "reorder categories";
        with_tx!(self, operation, |db_tx| {
            self.reorder_in(&db_tx, parent_id, ordered_ids).await
        })?;
        debug!(parent_id = ?parent_id, count = ordered_ids.len(), "categories reordered");
        Ok(())
    }

    async fn reorder_in<C: ConnectionTrait>(
        &self,
        db: &C,
        parent_id: Option<Uuid>,
        ordered_ids: &[Uuid],
    ) -> ResultRepo<()> {
        let operation = "reorder categories";
        let siblings: Vec<Uuid> = categories::Entity::find()
            .select_only()
            .column(categories::Column::Id)
            .filter(parent_is(parent_id))
            .filter(categories::Column::Status.ne(CategoryStatus::Archived.as_str()))
            .into_tuple()
            .all(db)
            .await
            .context(operation)?;
        let siblings: HashSet<Uuid> = siblings.into_iter().collect();
        let requested: HashSet<Uuid> = ordered_ids.iter().copied().collect();
        if siblings != requested {
            return Err(RepositoryError::Validation(
                "reorder must list every child of the parent exactly once".to_string(),
            ));
        }

        for (index, id) in ordered_ids.iter().enumerate() {
            let sort_order = i32::try_from(index + 1).map_err(|_| {
                RepositoryError::Validation("too many categories to reorder".to_string())
            })?;
            let rows = self
                .set_columns(
                    db,
                    operation,
                    Condition::all()
                        .add(categories::Column::Id.eq(*id))
                        .add(parent_is(parent_id)),
                    vec![(categories::Column::SortOrder, Expr::value(sort_order))],
                )
                .await?;
            if rows != 1 {
                return Err(RepositoryError::InvalidState(format!(
                    "category {id} changed parent during reorder"
                )));
            }
        }
        Ok(())
    }

    /// Switches between `active` and `inactive`.
    ///
    /// Archiving goes through [`archive_and_reassign`](Self::archive_and_reassign)
    /// and an archived category stays archived.
    pub async fn set_status(
        &self,
        id: Uuid,
        status: CategoryStatus,
    ) -> ResultRepo<Option<Category>> {
        if status == CategoryStatus::Archived {
            return Err(RepositoryError::InvalidState(
                "archiving requires a replacement category; use archive_and_reassign".to_string(),
            ));
        }
        let Some(current) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        if current.status == CategoryStatus::Archived {
            return Err(RepositoryError::InvalidState(format!(
                "category {id} is archived and cannot be reactivated"
            )));
        }
        if current.status == status {
            return Ok(Some(current));
        }

        self.set_columns(
            &self.db,
            "set category status",
            Condition::all()
                .add(categories::Column::Id.eq(id))
                .add(categories::Column::Status.ne(CategoryStatus::Archived.as_str())),
            vec![(categories::Column::Status, Expr::value(status.as_str()))],
        )
        .await?;
        self.find_by_id(id).await
    }

    /// Moves every transaction of `id` to `replacement_id`, then archives
    /// `id`, in one database transaction.
    ///
    /// Returns the number of transactions moved, or `None` when `id` does not
    /// exist.
    pub async fn archive_and_reassign(
        &self,
        id: Uuid,
        replacement_id: Uuid,
    ) -> ResultRepo<Option<u64>> {
        if id == replacement_id {
            return Err(RepositoryError::Validation(
                "replacement must differ from the archived category".to_string(),
            ));
        }
        let operation = "archive category";
        let moved = with_tx!(self, operation, |db_tx| {
            self.archive_in(&db_tx, id, replacement_id).await
        })?;
        if let Some(moved) = moved {
            info!(category_id = %id, %replacement_id, moved, "category archived");
        }
        Ok(moved)
    }

    async fn archive_in<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
        replacement_id: Uuid,
    ) -> ResultRepo<Option<u64>> {
        let operation = "archive category";
        let Some(category) = load(db, id, operation).await? else {
            return Ok(None);
        };
        if category.status == CategoryStatus::Archived {
            return Err(RepositoryError::InvalidState(format!(
                "category {id} is already archived"
            )));
        }
        let replacement = self.usable_target(db, replacement_id, operation).await?;

        let moved = reassign_transactions(db, id, Some(replacement.id), operation).await?;
        self.set_columns(
            db,
            operation,
            categories::Column::Id.eq(id),
            vec![(
                categories::Column::Status,
                Expr::value(CategoryStatus::Archived.as_str()),
            )],
        )
        .await?;
        Ok(Some(moved))
    }

    /// Folds `source_id` into `target_id`: transactions and children move to
    /// the target and the source is archived. All or nothing.
    pub async fn merge_categories(
        &self,
        source_id: Uuid,
        target_id: Uuid,
    ) -> ResultRepo<Option<MergeOutcome>> {
        if source_id == target_id {
            return Err(RepositoryError::Validation(
                "cannot merge a category into itself".to_string(),
            ));
        }
        let operation = "merge categories";
        let outcome = with_tx!(self, operation, |db_tx| {
            self.merge_in(&db_tx, source_id, target_id).await
        })?;
        if let Some(outcome) = &outcome {
            info!(
                %source_id,
                %target_id,
                transactions = outcome.transactions_moved,
                children = outcome.children_moved,
                "categories merged"
            );
        }
        Ok(outcome)
    }

    async fn merge_in<C: ConnectionTrait>(
        &self,
        db: &C,
        source_id: Uuid,
        target_id: Uuid,
    ) -> ResultRepo<Option<MergeOutcome>> {
        let operation = "merge categories";
        let Some(source) = load(db, source_id, operation).await? else {
            return Ok(None);
        };
        if source.is_system {
            return Err(RepositoryError::InvalidState(format!(
                "system category {source_id} cannot be merged away"
            )));
        }
        if source.status == CategoryStatus::Archived {
            return Err(RepositoryError::InvalidState(format!(
                "category {source_id} is already archived"
            )));
        }
        self.usable_target(db, target_id, operation).await?;
        if descendant_ids(db, source_id, MAX_WALK_DEPTH)
            .await?
            .contains(&target_id)
        {
            return Err(RepositoryError::InvalidState(format!(
                "cannot merge category {source_id} into its descendant {target_id}"
            )));
        }

        let transactions_moved =
            reassign_transactions(db, source_id, Some(target_id), operation).await?;
        let children_moved = self
            .adopt_children(db, source_id, Some(target_id), operation)
            .await?;
        self.set_columns(
            db,
            operation,
            categories::Column::Id.eq(source_id),
            vec![(
                categories::Column::Status,
                Expr::value(CategoryStatus::Archived.as_str()),
            )],
        )
        .await?;

        Ok(Some(MergeOutcome {
            transactions_moved,
            children_moved,
        }))
    }

    /// Hard-deletes a category. Its children move up to its parent and its
    /// transactions become uncategorized. System categories are refused.
    pub async fn delete_category(&self, id: Uuid) -> ResultRepo<bool> {
        let operation = "delete category";
        let deleted = with_tx!(self, operation, |db_tx| {
            self.delete_in(&db_tx, id).await
        })?;
        if deleted {
            info!(category_id = %id, "category deleted");
        }
        Ok(deleted)
    }

    async fn delete_in<C: ConnectionTrait>(&self, db: &C, id: Uuid) -> ResultRepo<bool> {
        let operation = "delete category";
        let Some(category) = load(db, id, operation).await? else {
            return Ok(false);
        };
        if category.is_system {
            return Err(RepositoryError::InvalidState(format!(
                "system category {id} cannot be deleted"
            )));
        }

        self.adopt_children(db, id, category.parent_id, operation)
            .await?;
        reassign_transactions(db, id, None, operation).await?;
        let result = categories::Entity::delete_by_id(id)
            .exec(db)
            .await
            .context(operation)?;
        Ok(result.rows_affected == 1)
    }

    /// Moves the children of `from` under `to`, after the existing children.
    async fn adopt_children<C: ConnectionTrait>(
        &self,
        db: &C,
        from: Uuid,
        to: Option<Uuid>,
        operation: &str,
    ) -> ResultRepo<u64> {
        let offset = next_sort_order(db, to).await? - 1;
        self.set_columns(
            db,
            operation,
            categories::Column::ParentId.eq(from),
            vec![
                (categories::Column::ParentId, Expr::value(to)),
                (
                    categories::Column::SortOrder,
                    Expr::col(categories::Column::SortOrder).add(offset),
                ),
            ],
        )
        .await
    }

    async fn usable_target<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
        operation: &str,
    ) -> ResultRepo<Category> {
        let target = load(db, id, operation).await?.ok_or_else(|| {
            RepositoryError::Validation(format!("replacement category {id} not found"))
        })?;
        if target.status == CategoryStatus::Archived {
            return Err(RepositoryError::InvalidState(format!(
                "replacement category {id} is archived"
            )));
        }
        Ok(target)
    }

    /// Active categories whose rules score above zero, best first. Equal
    /// scores keep sort order then name.
    pub async fn find_matching_categories(
        &self,
        merchant_name: Option<&str>,
        description: Option<&str>,
        amount: Option<f64>,
    ) -> ResultRepo<Vec<CategoryMatch>> {
        let candidates = self
            .find(sibling_order(FindOptions::filter(
                Condition::all().add(is_active()),
            )))
            .await?;

        let mut matches: Vec<CategoryMatch> = candidates
            .into_iter()
            .filter(|category| !category.rules.is_empty())
            .filter_map(|category| {
                let score = rules::score(&category.rules, merchant_name, description, amount);
                (score > 0).then_some(CategoryMatch { category, score })
            })
            .collect();
        matches.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(matches)
    }

    /// Best match allowed to auto-assign: `auto_assign` set and the score at
    /// least the category's confidence threshold.
    pub async fn suggest_category(
        &self,
        merchant_name: Option<&str>,
        description: Option<&str>,
        amount: Option<f64>,
    ) -> ResultRepo<Option<CategoryMatch>> {
        let matches = self
            .find_matching_categories(merchant_name, description, amount)
            .await?;
        Ok(matches.into_iter().find(|candidate| {
            let rules = &candidate.category.rules;
            rules.auto_assign && candidate.score >= rules.confidence_threshold.unwrap_or(1)
        }))
    }
}

async fn reassign_transactions<C: ConnectionTrait>(
    db: &C,
    from: Uuid,
    to: Option<Uuid>,
    operation: &str,
) -> ResultRepo<u64> {
    let result = transactions::Entity::update_many()
        .col_expr(transactions::Column::CategoryId, Expr::value(to))
        .col_expr(transactions::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(transactions::Column::CategoryId.eq(from))
        .exec(db)
        .await
        .context(operation)?;
    debug!(
        entity = "transaction",
        operation,
        from = %from,
        to = ?to,
        count = result.rows_affected,
        "transactions reassigned"
    );
    Ok(result.rows_affected)
}
