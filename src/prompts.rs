//! Prompt corpus
//!
//! System prompts and prompt builders for the three pipeline stages. The
//! generation prompt carries the fixed rule corpus plus worked examples; the
//! examples use a sample movie-rental schema on purpose — the engine is told
//! to adapt the patterns, never the table names.

/// System prompt for the refinement stage.
pub const REFINEMENT_SYSTEM_PROMPT: &str = "You are a request rewriter for a SQL generation system. \
Rewrite the user's request into one precise, unambiguous database operation description. \
Keep every identifier (database, table, column, value) exactly as the user wrote it. \
Reply with the rewritten request only - no explanations, no SQL.";

/// System prompt for the feasibility-validation stage.
pub const VALIDATION_SYSTEM_PROMPT: &str =
    "You are a validation system. You must reason step-by-step before deciding.";

/// System prompt for the statement-generation stage.
pub const GENERATION_SYSTEM_PROMPT: &str = "You are an expert MySQL database developer. \
You can generate any type of SQL query including SELECT, INSERT, UPDATE, DELETE, CREATE TABLE, \
ALTER TABLE, DROP TABLE, CREATE INDEX, etc. Always provide complete, syntactically correct, \
and optimized SQL queries. Focus on performance and best practices.";

/// Build the rewrite instruction for the refinement stage.
pub fn build_refinement_prompt(original_request: &str) -> String {
    format!(
        r#"Rewrite the following request as one precise database operation description.

Examples:
- "delete a database named cricket_info" -> "drop the database named cricket_info"
- "remove the table called old_users" -> "drop the table named old_users"
- "add a player called Kohli to players" -> "insert a row with name Kohli into the players table"

Request: "{}"

Rewritten request:"#,
        original_request
    )
}

/// Build the database-guard instruction for the feasibility stage.
///
/// `schema_block` lists every table with its typed columns; `data_note` is
/// the optional available-data section appended for insertion requests.
pub fn build_validation_prompt(
    request: &str,
    database: &str,
    schema_block: &str,
    data_note: Option<&str>,
) -> String {
    let data_section = match data_note {
        Some(note) => format!("\n{}\n", note),
        None => String::new(),
    };

    format!(
        r#"You are a strict database guard. Analyze the user query against the provided database schema.

Database: {}
Schema:
{}
{}
User Query: "{}"

INSTRUCTIONS:
1. IDENTIFY OPERATION: Is this SELECT, INSERT, UPDATE, DELETE, or CREATE/DROP?

2. IF SELECT / UPDATE / DELETE:
   - Check if the requested Tables and Columns exist in the schema.
   - STRICTLY MATCH specific types (e.g., "Test" vs "ODI", "Home" vs "Work").
   - REJECT if the specific column/table is missing.

3. IF INSERT:
   - Check if the target Table exists.
   - Check if the target Columns exist.
   - ALLOW new data values (e.g., "Insert player named X" is VALID even if X isn't in the data).
   - If referenced parent tables carry no data, REJECT with INVALID_ENTITY and say the data is insufficient.

4. IF CREATE:
   - ALLOW creating new tables or columns.
   - Do NOT reject because the table doesn't exist yet (that's the point of CREATE).

OUTPUT FORMAT (You must follow this exactly):
Reasoning: [Explain your thought process. Identify the operation type first.]
Status: [VALID | IRRELEVANT | INVALID_ENTITY]
Error: [If invalid, provide the error message here. Otherwise leave empty.]"#,
        database, schema_block, data_section, request
    )
}

/// Build the generation instruction: refined request + schema + rule corpus
/// + worked examples.
pub fn build_generation_prompt(refined_request: &str, database: &str, schema_block: &str) -> String {
    format!(
        r#"Convert the following natural language request into a complete, optimized MySQL query.

You can generate ANY type of SQL operation including:
- SELECT: Data retrieval with proper JOINs, WHERE conditions, GROUP BY, ORDER BY
- INSERT: Adding new records with proper value formatting
- UPDATE: Modifying existing records with WHERE conditions
- DELETE: Removing records with proper WHERE conditions
- CREATE TABLE: Table creation with appropriate data types, constraints, and indexes
- CREATE INDEX: Index creation for performance optimization
- ALTER TABLE: Table modifications (ADD/DROP columns, constraints, etc.)
- DROP TABLE/INDEX: Removing tables or indexes
- TRUNCATE: Emptying tables
- CREATE/DROP DATABASE: Database operations

Guidelines:
- Use proper MySQL syntax and data types (VARCHAR, INT, DATETIME, etc.)
- Include appropriate constraints (PRIMARY KEY, FOREIGN KEY, NOT NULL, UNIQUE)
- For SELECT queries: Use efficient JOINs, proper indexing, and optimization
- For INSERT queries: Supply values in the declared column order and handle data types correctly
- For UPDATE/DELETE: Always include WHERE conditions to prevent accidental mass operations
- For CREATE TABLE: Include proper data types, constraints, and consider indexes
- Always end queries with semicolon (;)
- Consider performance and best practices

Current Database: {}
Database Schema:
{}

User Request: {}

Here are some examples of how to handle complex queries.
NOTE: These examples use a sample movie-rental database. You must ADAPT these
SQL patterns (JOINs, Window Functions, etc.) to the CURRENT DATABASE SCHEMA
provided above. Do NOT use table names from the examples if they don't exist
in the current schema.

Example 1 (Aggregation & Joins):
Q: "Find the name of each film category and the number of films within each category."
SQL:
SELECT c.name AS category_name, COUNT(fc.film_id) AS film_count
FROM category c
JOIN film_category fc ON c.category_id = fc.category_id
GROUP BY c.name
ORDER BY film_count DESC;

Example 2 (Multi-Table Join):
Q: "Calculate the total revenue generated by each store."
SQL:
SELECT s.store_id, SUM(p.amount) AS total_revenue
FROM store s
JOIN staff st ON s.store_id = st.store_id
JOIN payment p ON st.staff_id = p.staff_id
GROUP BY s.store_id;

Example 3 (Window Functions):
Q: "For each store, find the top 3 customers who have spent the most money."
SQL:
WITH CustomerSpending AS (
    SELECT c.store_id, c.customer_id, c.first_name, c.last_name, SUM(p.amount) AS total_spent
    FROM customer c
    JOIN payment p ON c.customer_id = p.customer_id
    GROUP BY c.store_id, c.customer_id, c.first_name, c.last_name
),
RankedSpending AS (
    SELECT store_id, first_name, last_name, total_spent,
    DENSE_RANK() OVER (PARTITION BY store_id ORDER BY total_spent DESC) as ranking
    FROM CustomerSpending
)
SELECT * FROM RankedSpending WHERE ranking <= 3;

Example 4 (Date Extraction):
Q: "Get a monthly and yearly count of rentals."
SQL:
SELECT YEAR(rental_date) AS rental_year, MONTH(rental_date) AS rental_month, COUNT(rental_id) AS rental_count
FROM rental
GROUP BY YEAR(rental_date), MONTH(rental_date)
ORDER BY rental_year DESC, rental_month DESC;

Example 5 (Anti-Join / Not Exists):
Q: "Find all films that have never been rented."
SQL:
SELECT f.title
FROM film f
LEFT JOIN inventory i ON f.film_id = i.film_id
LEFT JOIN rental r ON i.inventory_id = r.inventory_id
WHERE r.rental_id IS NULL;

Example 6 (Top 1 Group Average):
Q: "Find the film category that has the highest average rental rate."
SQL:
SELECT c.name AS category_name, AVG(f.rental_rate) AS average_rate
FROM category c
JOIN film_category fc ON c.category_id = fc.category_id
JOIN film f ON fc.film_id = f.film_id
GROUP BY c.name
ORDER BY average_rate DESC
LIMIT 1;

Generate the appropriate SQL query:"#,
        database, schema_block, refined_request
    )
}
