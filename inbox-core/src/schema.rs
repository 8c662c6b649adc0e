use diesel::{allow_tables_to_appear_in_same_query, joinable, table};

table! {
    workspaces (id) {
        id -> BigInt,
        name -> Text,
        created_at -> Timestamptz,
    }
}

table! {
    workspace_members (id) {
        id -> BigInt,
        workspace_id -> BigInt,
        user_id -> BigInt,
        role -> Text,
        created_at -> Timestamptz,
    }
}

table! {
    social_accounts (id) {
        id -> BigInt,
        workspace_id -> BigInt,
        platform -> Text,
        external_account_id -> Text,
        display_name -> Text,
        status -> Text,
        access_token -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    post_targets (id) {
        id -> BigInt,
        workspace_id -> BigInt,
        social_account_id -> BigInt,
        platform_post_id -> Text,
        content_summary -> Nullable<Text>,
        published_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

table! {
    inbox_conversations (id) {
        id -> BigInt,
        workspace_id -> BigInt,
        social_account_id -> BigInt,
        conversation_key -> Text,
        participant_name -> Text,
        participant_username -> Nullable<Text>,
        status -> Text,
        message_count -> Integer,
        first_message_at -> Timestamptz,
        last_message_at -> Timestamptz,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    inbox_items (id) {
        id -> BigInt,
        workspace_id -> BigInt,
        social_account_id -> BigInt,
        conversation_id -> Nullable<BigInt>,
        post_target_id -> Nullable<BigInt>,
        item_type -> Text,
        status -> Text,
        platform_item_id -> Text,
        platform_post_id -> Nullable<Text>,
        platform_author_id -> Text,
        author_name -> Text,
        author_username -> Nullable<Text>,
        author_profile_url -> Nullable<Text>,
        content_text -> Text,
        platform_created_at -> Timestamptz,
        assigned_to_user_id -> Nullable<BigInt>,
        assigned_at -> Nullable<Timestamptz>,
        resolved_at -> Nullable<Timestamptz>,
        resolved_by_user_id -> Nullable<BigInt>,
        metadata -> Nullable<Jsonb>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    inbox_automation_rules (id) {
        id -> BigInt,
        workspace_id -> BigInt,
        name -> Text,
        trigger_type -> Text,
        trigger_conditions -> Jsonb,
        action_type -> Text,
        action_params -> Jsonb,
        priority -> Integer,
        is_active -> Bool,
        execution_count -> Integer,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    inbox_replies (id) {
        id -> BigInt,
        workspace_id -> BigInt,
        inbox_item_id -> BigInt,
        user_id -> BigInt,
        content -> Text,
        platform_reply_id -> Nullable<Text>,
        sent_at -> Nullable<Timestamptz>,
        failed_at -> Nullable<Timestamptz>,
        failure_reason -> Nullable<Text>,
        retry_count -> Integer,
        created_at -> Timestamptz,
    }
}

table! {
    inbox_internal_notes (id) {
        id -> BigInt,
        workspace_id -> BigInt,
        inbox_item_id -> BigInt,
        user_id -> BigInt,
        content -> Text,
        created_at -> Timestamptz,
    }
}

table! {
    inbox_tags (id) {
        id -> BigInt,
        workspace_id -> BigInt,
        name -> Text,
        color -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

table! {
    inbox_item_tags (id) {
        id -> BigInt,
        inbox_item_id -> BigInt,
        tag_id -> BigInt,
        created_at -> Timestamptz,
    }
}

table! {
    saved_replies (id) {
        id -> BigInt,
        workspace_id -> BigInt,
        title -> Text,
        content -> Text,
        usage_count -> Integer,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    inbox_contacts (id) {
        id -> BigInt,
        workspace_id -> BigInt,
        platform -> Text,
        platform_author_id -> Text,
        name -> Text,
        username -> Nullable<Text>,
        profile_url -> Nullable<Text>,
        interaction_count -> Integer,
        first_seen_at -> Timestamptz,
        last_seen_at -> Timestamptz,
    }
}

table! {
    post_metric_snapshots (id) {
        id -> BigInt,
        workspace_id -> BigInt,
        post_target_id -> BigInt,
        likes -> Integer,
        comments -> Integer,
        shares -> Integer,
        impressions -> Integer,
        reach -> Integer,
        engagement_rate -> Nullable<Double>,
        captured_at -> Timestamptz,
    }
}

table! {
    notifications (id) {
        id -> BigInt,
        workspace_id -> BigInt,
        user_id -> BigInt,
        notification_type -> Text,
        title -> Text,
        message -> Text,
        data -> Nullable<Jsonb>,
        action_url -> Nullable<Text>,
        read_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

joinable!(inbox_item_tags -> inbox_tags (tag_id));
joinable!(inbox_item_tags -> inbox_items (inbox_item_id));

allow_tables_to_appear_in_same_query!(
    workspaces,
    workspace_members,
    social_accounts,
    post_targets,
    inbox_conversations,
    inbox_items,
    inbox_automation_rules,
    inbox_replies,
    inbox_internal_notes,
    inbox_tags,
    inbox_item_tags,
    saved_replies,
    inbox_contacts,
    post_metric_snapshots,
    notifications,
);
