//! Input validation, kept apart from the storage mapping.
//!
//! Each `validate_*` function takes caller input and returns it normalized
//! (trimmed text, lowercased email, derived slug) or a
//! [`RepositoryError::Validation`]. Nothing here touches the database.

use crate::{
    Account, AccountPatch, Category, CategoryPatch, CategoryRules, MoneyCents, NewAccount,
    NewCategory, NewTransaction, NewUser, RepositoryError, ResultRepo, Transaction,
    TransactionPatch, User, UserPatch,
    util::{is_valid_slug, normalize_optional, normalize_required, slugify},
};

const MAX_NAME_LEN: usize = 120;
const MAX_TAGS: usize = 32;

fn invalid(message: impl Into<String>) -> RepositoryError {
    RepositoryError::Validation(message.into())
}

pub fn normalize_email(value: &str) -> ResultRepo<String> {
    let email = value.trim().to_lowercase();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(invalid(format!("invalid email: {value}")));
    };
    if local.is_empty()
        || domain.len() < 3
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || domain.contains('@')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid(format!("invalid email: {value}")));
    }
    Ok(email)
}

fn check_name(value: &str, label: &str) -> ResultRepo<String> {
    let name = normalize_required(value, label)?;
    if name.chars().count() > MAX_NAME_LEN {
        return Err(invalid(format!(
            "{label} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

fn check_color(color: Option<String>) -> ResultRepo<Option<String>> {
    let Some(color) = normalize_optional(color) else {
        return Ok(None);
    };
    let hex = color.strip_prefix('#').unwrap_or_default();
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid(format!("color must look like #RRGGBB: {color}")));
    }
    Ok(Some(color.to_lowercase()))
}

fn check_slug(slug: &str) -> ResultRepo<String> {
    let slug = slug.trim();
    if !is_valid_slug(slug) {
        return Err(invalid(format!("invalid slug: {slug}")));
    }
    Ok(slug.to_string())
}

fn check_rules(rules: &CategoryRules) -> ResultRepo<()> {
    for range in &rules.amount_ranges {
        if let (Some(min), Some(max)) = (range.min, range.max)
            && min > max
        {
            return Err(invalid(format!("amount range min {min} exceeds max {max}")));
        }
        if range.min.is_some_and(|min| min < 0.0) || range.max.is_some_and(|max| max < 0.0) {
            return Err(invalid("amount ranges must be non-negative"));
        }
    }
    Ok(())
}

fn check_amount(amount: MoneyCents) -> ResultRepo<()> {
    if amount.is_negative() {
        return Err(invalid(
            "amount must be a non-negative magnitude; use the transaction type for direction",
        ));
    }
    Ok(())
}

fn normalize_tags(tags: Vec<String>) -> ResultRepo<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    if out.len() > MAX_TAGS {
        return Err(invalid(format!("at most {MAX_TAGS} tags are allowed")));
    }
    Ok(out)
}

pub fn validate_new_user(input: NewUser) -> ResultRepo<NewUser> {
    if input.password_hash.trim().is_empty() {
        return Err(invalid("password hash must not be empty"));
    }
    Ok(NewUser {
        email: normalize_email(&input.email)?,
        first_name: normalize_optional(input.first_name),
        last_name: normalize_optional(input.last_name),
        ..input
    })
}

pub fn validate_user_patch(patch: UserPatch) -> ResultRepo<UserPatch> {
    if patch
        .password_hash
        .as_deref()
        .is_some_and(|hash| hash.trim().is_empty())
    {
        return Err(invalid("password hash must not be empty"));
    }
    Ok(UserPatch {
        email: patch.email.as_deref().map(normalize_email).transpose()?,
        first_name: patch.first_name.map(normalize_optional),
        last_name: patch.last_name.map(normalize_optional),
        ..patch
    })
}

pub fn validate_new_account(input: NewAccount) -> ResultRepo<NewAccount> {
    let name = check_name(&input.name, "account name")?;
    if input.credit_limit.is_some_and(MoneyCents::is_negative) {
        return Err(invalid("credit limit must be non-negative"));
    }
    if let Some(provider) = &input.provider
        && provider.account_id.trim().is_empty()
    {
        return Err(invalid("provider account id must not be empty"));
    }
    Ok(NewAccount { name, ..input })
}

pub fn validate_account_patch(patch: AccountPatch) -> ResultRepo<AccountPatch> {
    let name = patch
        .name
        .as_deref()
        .map(|name| check_name(name, "account name"))
        .transpose()?;
    if patch
        .credit_limit
        .flatten()
        .is_some_and(MoneyCents::is_negative)
    {
        return Err(invalid("credit limit must be non-negative"));
    }
    Ok(AccountPatch { name, ..patch })
}

/// Also derives the slug from the name when none was given.
pub fn validate_new_category(input: NewCategory) -> ResultRepo<NewCategory> {
    let name = check_name(&input.name, "category name")?;
    let slug = match input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => check_slug(slug)?,
        None => slugify(&name)
            .ok_or_else(|| invalid(format!("cannot derive a slug from '{name}'")))?,
    };
    check_rules(&input.rules)?;
    Ok(NewCategory {
        name,
        slug: Some(slug),
        color: check_color(input.color)?,
        icon: normalize_optional(input.icon),
        ..input
    })
}

pub fn validate_category_patch(patch: CategoryPatch) -> ResultRepo<CategoryPatch> {
    if let Some(rules) = &patch.rules {
        check_rules(rules)?;
    }
    Ok(CategoryPatch {
        name: patch
            .name
            .as_deref()
            .map(|name| check_name(name, "category name"))
            .transpose()?,
        slug: patch.slug.as_deref().map(check_slug).transpose()?,
        color: patch.color.map(check_color).transpose()?,
        icon: patch.icon.map(normalize_optional),
        ..patch
    })
}

pub fn validate_new_transaction(input: NewTransaction) -> ResultRepo<NewTransaction> {
    check_amount(input.amount)?;
    let description = normalize_required(&input.description, "description")?;
    if let Some(external_id) = &input.external_id
        && external_id.trim().is_empty()
    {
        return Err(invalid("external id must not be empty when present"));
    }
    Ok(NewTransaction {
        description,
        merchant_name: normalize_optional(input.merchant_name),
        notes: normalize_optional(input.notes),
        tags: normalize_tags(input.tags)?,
        ..input
    })
}

pub fn validate_transaction_patch(patch: TransactionPatch) -> ResultRepo<TransactionPatch> {
    if let Some(amount) = patch.amount {
        check_amount(amount)?;
    }
    Ok(TransactionPatch {
        description: patch
            .description
            .as_deref()
            .map(|d| normalize_required(d, "description"))
            .transpose()?,
        merchant_name: patch.merchant_name.map(normalize_optional),
        notes: patch.notes.map(normalize_optional),
        tags: patch.tags.map(normalize_tags).transpose()?,
        ..patch
    })
}

// Full records, as written by `save`. These only check; they never rewrite
// the caller's record.

pub fn validate_user_record(user: &User) -> ResultRepo<()> {
    normalize_email(&user.email)?;
    if user.password_hash.trim().is_empty() {
        return Err(invalid("password hash must not be empty"));
    }
    Ok(())
}

pub fn validate_account_record(account: &Account) -> ResultRepo<()> {
    check_name(&account.name, "account name")?;
    if account.credit_limit.is_some_and(MoneyCents::is_negative) {
        return Err(invalid("credit limit must be non-negative"));
    }
    if let Some(provider) = &account.provider
        && provider.account_id.trim().is_empty()
    {
        return Err(invalid("provider account id must not be empty"));
    }
    Ok(())
}

pub fn validate_category_record(category: &Category) -> ResultRepo<()> {
    check_name(&category.name, "category name")?;
    check_slug(&category.slug)?;
    check_color(category.color.clone())?;
    check_rules(&category.rules)?;
    if category.parent_id == Some(category.id) {
        return Err(RepositoryError::InvalidState(format!(
            "category {} cannot be its own parent",
            category.id
        )));
    }
    Ok(())
}

pub fn validate_transaction_record(transaction: &Transaction) -> ResultRepo<()> {
    check_amount(transaction.amount)?;
    normalize_required(&transaction.description, "description")?;
    if let Some(external_id) = &transaction.external_id
        && external_id.trim().is_empty()
    {
        return Err(invalid("external id must not be empty when present"));
    }
    normalize_tags(transaction.tags.clone())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;
    use crate::{AccountType, AmountRange, CategoryType, ErrorKind};

    #[test]
    fn emails_are_lowercased_and_checked() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        for bad in ["", "ada", "@example.com", "ada@", "ada@example", "a da@example.com"] {
            assert!(normalize_email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn new_user_requires_password_hash() {
        let input = NewUser {
            email: "ada@example.com".to_string(),
            ..Default::default()
        };
        let err = validate_new_user(input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn category_slug_is_derived_from_name() {
        let input = NewCategory::named("  Dining Out ", CategoryType::Expense);
        let valid = validate_new_category(input).unwrap();
        assert_eq!(valid.name, "Dining Out");
        assert_eq!(valid.slug.as_deref(), Some("dining-out"));
    }

    #[test]
    fn category_rejects_bad_slug_color_and_ranges() {
        let mut input = NewCategory::named("Food", CategoryType::Expense);
        input.slug = Some("Food Stuff".to_string());
        assert!(validate_new_category(input).is_err());

        let mut input = NewCategory::named("Food", CategoryType::Expense);
        input.color = Some("red".to_string());
        assert!(validate_new_category(input).is_err());

        let mut input = NewCategory::named("Food", CategoryType::Expense);
        input.rules.amount_ranges.push(AmountRange {
            min: Some(10.0),
            max: Some(1.0),
        });
        assert!(validate_new_category(input).is_err());
    }

    #[test]
    fn transactions_reject_negative_amounts_and_dedupe_tags() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let account = Uuid::new_v4();

        let negative = NewTransaction::debit(account, MoneyCents::new(-1), date, "Refund");
        assert!(validate_new_transaction(negative).is_err());

        let mut input = NewTransaction::debit(account, MoneyCents::new(100), date, " Lunch ");
        input.tags = vec!["Work".to_string(), "work ".to_string(), " ".to_string()];
        let valid = validate_new_transaction(input).unwrap();
        assert_eq!(valid.description, "Lunch");
        assert_eq!(valid.tags, vec!["work".to_string()]);
    }

    #[test]
    fn account_name_is_required() {
        let input = NewAccount::manual(Uuid::new_v4(), "   ", AccountType::Checking);
        assert!(validate_new_account(input).is_err());
    }
}
